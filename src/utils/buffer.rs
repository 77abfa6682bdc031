//! Mono `f32` buffer helpers used on the audio thread.

// -------------------------------------------------------------------------------------------------

/// Set all samples of the given buffer to 0.
#[inline]
pub fn clear_buffer(buffer: &mut [f32]) {
    buffer.fill(0.0);
}

// -------------------------------------------------------------------------------------------------
