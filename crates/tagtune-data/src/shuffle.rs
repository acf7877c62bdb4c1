//! Buffered shuffle of sample indices.

use rand::Rng;

/// Default shuffle buffer, in samples.
pub const DEFAULT_SHUFFLE_BUFFER: usize = 10_000;

/// Produce a visiting order for `len` samples using a shuffle buffer.
///
/// The first `buffer_size` indices fill the buffer. Each step emits a random
/// buffer slot and refills it with the next source index; once the source is
/// dry the buffer drains in random order. When `len <= buffer_size` this is a
/// uniform shuffle of everything. A buffer of 0 or 1 keeps the source order.
pub fn shuffle_order<R: Rng + ?Sized>(len: usize, buffer_size: usize, rng: &mut R) -> Vec<usize> {
    let buffer_size = buffer_size.max(1);
    let mut source = 0..len;
    let mut buffer: Vec<usize> = source.by_ref().take(buffer_size).collect();
    let mut order = Vec::with_capacity(len);

    while !buffer.is_empty() {
        let slot = rng.gen_range(0..buffer.len());
        match source.next() {
            Some(next) => order.push(std::mem::replace(&mut buffer[slot], next)),
            None => order.push(buffer.swap_remove(slot)),
        }
    }

    order
}
