//! ZIPアーカイブへのパート書き込み
//!
//! 2つの戦略を提供します。
//!
//! - [`ArchiveWriter`]: `zip`クレートによる通常のアーカイブ。出力先にシークが必要
//! - [`StreamingZipWriter`]: 各エントリの後ろにデータディスクリプタを置く逐次書き込み。
//!   出力先は`Write`だけでよく、一度書いたバイトに戻ることはありません

use chrono::{Datelike, NaiveDateTime, Timelike};
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{self, Read, Seek, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::XlsxNativeError;

/// パートの書き込み先
pub(crate) trait PartSink {
    /// `source`の内容を`name`という名前のパートとして書き込む
    fn write_part(&mut self, name: &str, source: &mut dyn Read) -> Result<(), XlsxNativeError>;
}

/// MS-DOS形式の更新日時（ZIPヘッダー用）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DosTimestamp {
    date: u16,
    time: u16,
}

impl DosTimestamp {
    /// 日時を変換（DOS形式で表現できない1980年より前・2107年より後は範囲内に丸める）
    pub fn from_datetime(timestamp: NaiveDateTime) -> Self {
        let year = timestamp.year().clamp(1980, 2107) as u16;
        let date = ((year - 1980) << 9) | ((timestamp.month() as u16) << 5) | timestamp.day() as u16;
        let time = ((timestamp.hour() as u16) << 11)
            | ((timestamp.minute() as u16) << 5)
            | (timestamp.second() as u16 / 2);
        Self { date, time }
    }

    fn year(&self) -> u16 {
        (self.date >> 9) + 1980
    }

    fn month(&self) -> u8 {
        ((self.date >> 5) & 0x0f) as u8
    }

    fn day(&self) -> u8 {
        (self.date & 0x1f) as u8
    }

    fn hour(&self) -> u8 {
        (self.time >> 11) as u8
    }

    fn minute(&self) -> u8 {
        ((self.time >> 5) & 0x3f) as u8
    }

    fn second(&self) -> u8 {
        ((self.time & 0x1f) * 2) as u8
    }
}

impl Default for DosTimestamp {
    /// 1980-01-01 00:00:00
    fn default() -> Self {
        Self {
            date: (1 << 5) | 1,
            time: 0,
        }
    }
}

/// 通常のZIPアーカイブ（whole-archive方式）
pub(crate) struct ArchiveWriter<W: Write + Seek> {
    zip: ZipWriter<W>,
    options: FileOptions,
}

impl<W: Write + Seek> ArchiveWriter<W> {
    pub fn new(inner: W, modified: DosTimestamp) -> Self {
        let mut options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        if let Ok(datetime) = zip::DateTime::from_date_and_time(
            modified.year(),
            modified.month(),
            modified.day(),
            modified.hour(),
            modified.minute(),
            modified.second(),
        ) {
            options = options.last_modified_time(datetime);
        }

        Self {
            zip: ZipWriter::new(inner),
            options,
        }
    }

    /// セントラルディレクトリを書き込み、出力先を返す
    pub fn finish(mut self) -> Result<W, XlsxNativeError> {
        Ok(self.zip.finish()?)
    }
}

impl<W: Write + Seek> PartSink for ArchiveWriter<W> {
    fn write_part(&mut self, name: &str, source: &mut dyn Read) -> Result<(), XlsxNativeError> {
        self.zip.start_file(name, self.options)?;
        io::copy(source, &mut self.zip)?;
        Ok(())
    }
}

const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x0403_4b50;
const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x0807_4b50;
const CENTRAL_DIRECTORY_HEADER_SIGNATURE: u32 = 0x0201_4b50;
const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0605_4b50;

/// 展開に必要なバージョン（2.0: Deflate）
const VERSION_NEEDED: u16 = 20;
/// 汎用フラグ: bit 3 = データディスクリプタ使用、bit 11 = UTF-8ファイル名
const GENERAL_PURPOSE_FLAGS: u16 = 0x0008 | 0x0800;
const METHOD_DEFLATE: u16 = 8;

/// 書き込み済みエントリの情報（セントラルディレクトリ用）
struct CentralEntry {
    name: String,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    local_header_offset: u32,
}

/// 逐次書き込みZIPライター（streaming方式）
///
/// ローカルヘッダーではCRCとサイズを0とし、圧縮データの直後に
/// データディスクリプタで実際の値を書き込みます。ZIP64には対応しないため、
/// 4GiBを超えるエントリやアーカイブは`Io`エラーになります。
pub(crate) struct StreamingZipWriter<W: Write> {
    out: CountingWriter<W>,
    entries: Vec<CentralEntry>,
    modified: DosTimestamp,
}

impl<W: Write> StreamingZipWriter<W> {
    pub fn new(inner: W, modified: DosTimestamp) -> Self {
        Self {
            out: CountingWriter {
                inner,
                written: 0,
            },
            entries: Vec::new(),
            modified,
        }
    }

    /// セントラルディレクトリと終端レコードを書き込み、出力先を返す
    pub fn finish(mut self) -> Result<W, XlsxNativeError> {
        let central_directory_offset = to_u32(self.out.written, "central directory offset")?;

        for entry in &self.entries {
            let name = entry.name.as_bytes();
            let mut header = Vec::with_capacity(46 + name.len());
            put_u32(&mut header, CENTRAL_DIRECTORY_HEADER_SIGNATURE);
            put_u16(&mut header, VERSION_NEEDED); // version made by
            put_u16(&mut header, VERSION_NEEDED);
            put_u16(&mut header, GENERAL_PURPOSE_FLAGS);
            put_u16(&mut header, METHOD_DEFLATE);
            put_u16(&mut header, self.modified.time);
            put_u16(&mut header, self.modified.date);
            put_u32(&mut header, entry.crc32);
            put_u32(&mut header, entry.compressed_size);
            put_u32(&mut header, entry.uncompressed_size);
            put_u16(&mut header, name.len() as u16);
            put_u16(&mut header, 0); // extra field length
            put_u16(&mut header, 0); // comment length
            put_u16(&mut header, 0); // disk number start
            put_u16(&mut header, 0); // internal attributes
            put_u32(&mut header, 0); // external attributes
            put_u32(&mut header, entry.local_header_offset);
            header.extend_from_slice(name);
            self.out.write_all(&header)?;
        }

        let central_directory_size = to_u32(
            self.out.written - central_directory_offset as u64,
            "central directory size",
        )?;
        let entry_count = u16::try_from(self.entries.len()).map_err(|_| {
            XlsxNativeError::Io(io::Error::new(
                io::ErrorKind::Other,
                "too many ZIP entries without ZIP64 support",
            ))
        })?;

        let mut record = Vec::with_capacity(22);
        put_u32(&mut record, END_OF_CENTRAL_DIRECTORY_SIGNATURE);
        put_u16(&mut record, 0); // number of this disk
        put_u16(&mut record, 0); // disk with central directory
        put_u16(&mut record, entry_count);
        put_u16(&mut record, entry_count);
        put_u32(&mut record, central_directory_size);
        put_u32(&mut record, central_directory_offset);
        put_u16(&mut record, 0); // comment length
        self.out.write_all(&record)?;
        self.out.flush()?;

        log::debug!(
            "streamed ZIP archive finished: {} entries, {} bytes",
            self.entries.len(),
            self.out.written
        );
        Ok(self.out.inner)
    }
}

impl<W: Write> PartSink for StreamingZipWriter<W> {
    fn write_part(&mut self, name: &str, source: &mut dyn Read) -> Result<(), XlsxNativeError> {
        let local_header_offset = to_u32(self.out.written, "local header offset")?;
        let name_bytes = name.as_bytes();

        let mut header = Vec::with_capacity(30 + name_bytes.len());
        put_u32(&mut header, LOCAL_FILE_HEADER_SIGNATURE);
        put_u16(&mut header, VERSION_NEEDED);
        put_u16(&mut header, GENERAL_PURPOSE_FLAGS);
        put_u16(&mut header, METHOD_DEFLATE);
        put_u16(&mut header, self.modified.time);
        put_u16(&mut header, self.modified.date);
        put_u32(&mut header, 0); // crc-32（データディスクリプタに記録）
        put_u32(&mut header, 0); // compressed size
        put_u32(&mut header, 0); // uncompressed size
        put_u16(&mut header, name_bytes.len() as u16);
        put_u16(&mut header, 0); // extra field length
        header.extend_from_slice(name_bytes);
        self.out.write_all(&header)?;

        let data_start = self.out.written;
        let (hasher, size) = {
            let mut checksummed = ChecksumWriter {
                inner: DeflateEncoder::new(&mut self.out, Compression::default()),
                hasher: crc32fast::Hasher::new(),
                size: 0,
            };
            io::copy(source, &mut checksummed)?;
            let ChecksumWriter { inner, hasher, size } = checksummed;
            inner.finish()?;
            (hasher, size)
        };

        let crc32 = hasher.finalize();
        let compressed_size = to_u32(self.out.written - data_start, name)?;
        let uncompressed_size = to_u32(size, name)?;

        let mut descriptor = Vec::with_capacity(16);
        put_u32(&mut descriptor, DATA_DESCRIPTOR_SIGNATURE);
        put_u32(&mut descriptor, crc32);
        put_u32(&mut descriptor, compressed_size);
        put_u32(&mut descriptor, uncompressed_size);
        self.out.write_all(&descriptor)?;

        log::trace!(
            "streamed part {}: {} -> {} bytes",
            name,
            uncompressed_size,
            compressed_size
        );
        self.entries.push(CentralEntry {
            name: name.to_string(),
            crc32,
            compressed_size,
            uncompressed_size,
            local_header_offset,
        });
        Ok(())
    }
}

/// 書き込んだバイト数を数えるライター
struct CountingWriter<W: Write> {
    inner: W,
    written: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// 非圧縮データのCRC-32とサイズを計算しながら書き込むライター
struct ChecksumWriter<W: Write> {
    inner: W,
    hasher: crc32fast::Hasher,
    size: u64,
}

impl<W: Write> Write for ChecksumWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.size += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn put_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn to_u32(value: u64, what: &str) -> Result<u32, XlsxNativeError> {
    u32::try_from(value).map_err(|_| {
        XlsxNativeError::Io(io::Error::new(
            io::ErrorKind::Other,
            format!("{} exceeds 4 GiB, ZIP64 is not supported", what),
        ))
    })
}
