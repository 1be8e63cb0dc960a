pub mod inverter; // Synchronous and background-polling access
pub mod protocol; // QPIGS request framing and response decoding
pub mod session; // Device handle lifecycle and chunked I/O
