//! Flow log ingestion: bounded corpus loading for training and live tailing for scoring.

pub mod corpus;
pub mod tailer;

pub use corpus::{load_corpus, read_corpus, CorpusLoad};
pub use tailer::{lines_stream, LineStream, LogTailer, TailOptions};
