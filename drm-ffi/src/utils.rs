/// Takes an `Option<&mut Vec<T>>` style buffer and gets its pointer.
macro_rules! map_ptr {
    ($buffer:expr) => {
        match $buffer {
            Some(ref b) => b.as_ptr() as _,
            None => 0 as _,
        }
    };
}

/// Takes an `Option<&mut Vec<T>>` style buffer and gets its length.
macro_rules! map_len {
    ($buffer:expr) => {
        match $buffer {
            Some(ref b) => b.len() as _,
            None => 0 as _,
        }
    };
}

/// Grows an `Option<&mut Vec<T>>` buffer to at least `count` elements so a
/// second, filling ioctl call has somewhere to write.
macro_rules! map_reserve {
    ($buffer:expr, $count:expr) => {
        if let Some(ref mut b) = $buffer {
            let count = $count;
            if b.len() < count {
                b.resize_with(count, Default::default);
            }
        }
    };
}

/// Shrinks an `Option<&mut Vec<T>>` buffer down to the count the kernel
/// actually reported filling.
macro_rules! map_set {
    ($buffer:expr, $count:expr) => {
        if let Some(ref mut b) = $buffer {
            b.truncate($count);
        }
    };
}
