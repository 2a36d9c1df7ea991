//! 出力先の検証と書き込み方式の選択
//!
//! ファイルパスへ書き込む場合、その場で開いてシークできればそのまま使用します。
//! 開けない、またはシークできない出力先（デバイス、パイプ、制限のあるマウントなど）では、
//! 一時ファイル上でアーカイブを組み立ててから出力先へコピーし、一時ファイルを削除します。

use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::NamedTempFile;

use crate::error::XlsxNativeError;

/// 書き込み開始前に出力先パスを検証
///
/// - 親ディレクトリが存在しない → `Validation`
/// - 親ディレクトリが書き込み禁止 → `Validation`
/// - パスがディレクトリ → `Validation`
pub(crate) fn validate_destination(path: &Path) -> Result<(), XlsxNativeError> {
    if path.as_os_str().is_empty() {
        return Err(XlsxNativeError::Validation(
            "Destination path is empty".to_string(),
        ));
    }
    if path.is_dir() {
        return Err(XlsxNativeError::Validation(format!(
            "Destination is a directory: {}",
            path.display()
        )));
    }

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let metadata = fs::metadata(parent).map_err(|_| {
        XlsxNativeError::Validation(format!(
            "Destination directory does not exist: {}",
            parent.display()
        ))
    })?;
    if !metadata.is_dir() {
        return Err(XlsxNativeError::Validation(format!(
            "Destination parent is not a directory: {}",
            parent.display()
        )));
    }
    if metadata.permissions().readonly() {
        return Err(XlsxNativeError::Validation(format!(
            "Destination directory is not writable: {}",
            parent.display()
        )));
    }

    Ok(())
}

/// 出力先をその場で上書き用に開く
///
/// 読み書き可能で、かつシークできる場合のみ`Some`を返します。
pub(crate) fn open_in_place(path: &Path) -> Option<File> {
    let mut file = match OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
    {
        Ok(file) => file,
        Err(e) => {
            log::debug!("cannot open {} in place: {}", path.display(), e);
            return None;
        }
    };

    match file.seek(SeekFrom::Start(0)) {
        Ok(_) => Some(file),
        Err(e) => {
            log::debug!("{} is not seekable: {}", path.display(), e);
            None
        }
    }
}

/// 出力先を書き込み専用で開く
pub(crate) fn create_destination(path: &Path) -> Result<File, XlsxNativeError> {
    Ok(File::create(path)?)
}

/// 一時ファイル上で組み立ててから`dest`へコピー
///
/// `build`は一時ファイルへアーカイブを書き込みます。コピーしたバイト数を返し、
/// コピー後、一時ファイルは削除されます。
pub(crate) fn build_in_temp_then_copy<F, W>(dest: &mut W, build: F) -> Result<u64, XlsxNativeError>
where
    F: FnOnce(&mut File) -> Result<(), XlsxNativeError>,
    W: Write + ?Sized,
{
    let mut temp = NamedTempFile::new()?;
    log::debug!("building archive in temporary file {}", temp.path().display());

    build(temp.as_file_mut())?;

    let file = temp.as_file_mut();
    file.flush()?;
    file.seek(SeekFrom::Start(0))?;
    let copied = io::copy(file, dest)?;
    dest.flush()?;

    temp.close()?;
    Ok(copied)
}
