pub(crate) mod bit_cursor_encoder;
pub(crate) mod gorilla_encoder;
pub(crate) mod series_encoder;
pub(crate) mod timestamps_encoder;
pub(crate) mod xor_encoder;
