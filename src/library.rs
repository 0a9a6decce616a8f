//! Turning a directory of audio files into queueable tracks.

mod scan;

pub use scan::scan;
