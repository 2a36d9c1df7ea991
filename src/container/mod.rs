//! Zip Container
//!
//! パッケージ（ZIPアーカイブ）の読み出しと書き込みを抽象化するモジュール。

mod reader;
mod sink;
mod writer;

pub(crate) use reader::ZipContainer;
pub(crate) use sink::{build_in_temp_then_copy, create_destination, open_in_place, validate_destination};
pub(crate) use writer::{ArchiveWriter, DosTimestamp, PartSink, StreamingZipWriter};
