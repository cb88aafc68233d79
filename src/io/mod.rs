//! Input and output utility.
use std::{fs, io};
use std::error::Error as StdError;
use std::fs::File;
use std::io::Write;
use std::path::{self, Path};
use super::state::State;

/// Identifies snapshot files.
pub const MAGIC: [u8; 4] = *b"MFRG";

/// Bumped whenever the serialized layout of `State` changes.
pub const FORMAT_VERSION: u32 = 1;

quick_error! {
    #[derive(Debug)]
    pub enum Error {
        Io(err: io::Error) {
            from()
            source(err)
            display("{}", err)
        }
        Bincode(err: bincode::Error) {
            from()
            source(err)
            display("cannot decode snapshot: {}", err)
        }
        Format(version: u32) {
            display("unsupported snapshot version {} (expected {})",
                    version, FORMAT_VERSION)
        }
    }
}

/// Helper function for creating `io::Error` with
/// `io::ErrorKind::InvalidData`.
pub fn invalid_data<E: Into<Box<dyn StdError + Send + Sync>>>(error: E) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, error)
}

/// Works just like Python's `os.path.splitext`.  Note that the returned
/// extension includes the dot.  If there is no extension, returns an empty
/// string as the extension.  Only works on UTF-8 strings due to limitations
/// of the `std::path::Path` API.
pub fn split_extension(path: &Path) -> io::Result<(&str, &str)> {
    let path = path.to_str()
        .ok_or_else(|| invalid_data("path is not UTF-8"))?;
    match path.rfind('.') {
        None => Ok((path, "")),
        Some(i) => {
            let ext = &path[i ..];
            if ext.chars().any(|c| path::is_separator(c)) {
                Ok((path, ""))
            } else {
                Ok((&path[.. i], ext))
            }
        }
    }
}

/// Compression inferred from the extension: `.gz`, `.xz`, or none.
fn compression(path: &Path) -> io::Result<&'static str> {
    let (_, ext) = split_extension(path)?;
    match ext {
        ".gz" => Ok(".gz"),
        ".xz" => Ok(".xz"),
        ext if ext.ends_with("z") => Err(invalid_data(
            format!("unrecognized compression format: {}", ext),
        )),
        _ => Ok(""),
    }
}

/// Open a compressed file and decode based on the file extension.
/// If the extension does not end in "z", the file is read as-is.
pub fn open_compressed(path: &Path) -> io::Result<Box<dyn io::Read>> {
    let file = io::BufReader::new(File::open(path)?);
    Ok(match compression(path)? {
        ".gz" => Box::new(flate2::read::GzDecoder::new(file)),
        ".xz" => Box::new(xz2::read::XzDecoder::new(file)),
        _ => Box::new(file),
    })
}

/// Counterpart of `open_compressed`.  The stream is finished by `finish`;
/// dropping it loses write errors of the trailer.
pub enum CompressedWriter {
    Plain(io::BufWriter<File>),
    Gz(flate2::write::GzEncoder<io::BufWriter<File>>),
    Xz(xz2::write::XzEncoder<io::BufWriter<File>>),
}

impl CompressedWriter {
    pub fn finish(self) -> io::Result<()> {
        let mut inner = match self {
            CompressedWriter::Plain(w) => w,
            CompressedWriter::Gz(w) => w.finish()?,
            CompressedWriter::Xz(w) => w.finish()?,
        };
        inner.flush()
    }
}

impl io::Write for CompressedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match *self {
            CompressedWriter::Plain(ref mut w) => w.write(buf),
            CompressedWriter::Gz(ref mut w) => w.write(buf),
            CompressedWriter::Xz(ref mut w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match *self {
            CompressedWriter::Plain(ref mut w) => w.flush(),
            CompressedWriter::Gz(ref mut w) => w.flush(),
            CompressedWriter::Xz(ref mut w) => w.flush(),
        }
    }
}

pub fn create_compressed(path: &Path) -> io::Result<CompressedWriter> {
    let ext = compression(path)?;
    let file = io::BufWriter::new(File::create(path)?);
    Ok(match ext {
        ".gz" => CompressedWriter::Gz(flate2::write::GzEncoder::new(
            file, flate2::Compression::default())),
        ".xz" => CompressedWriter::Xz(xz2::write::XzEncoder::new(file, 6)),
        _ => CompressedWriter::Plain(file),
    })
}

/// Write a snapshot of the flow state.  The file is written next to its
/// destination and renamed into place once complete.
pub fn save_state(path: &Path, state: &State) -> Result<(), Error> {
    let (stem, ext) = split_extension(path)?;
    let tmp = format!("{}.tmp{}", stem, ext);
    let tmp = Path::new(&tmp);
    {
        let mut w = create_compressed(tmp)?;
        bincode::serialize_into(&mut w, &MAGIC)?;
        bincode::serialize_into(&mut w, &FORMAT_VERSION)?;
        bincode::serialize_into(&mut w, state)?;
        w.finish()?;
    }
    fs::rename(tmp, path)?;
    Ok(())
}

pub fn load_state(path: &Path) -> Result<State, Error> {
    let mut r = open_compressed(path)?;
    let magic: [u8; 4] = bincode::deserialize_from(&mut r)?;
    if magic != MAGIC {
        return Err(invalid_data("not a snapshot file").into());
    }
    let version: u32 = bincode::deserialize_from(&mut r)?;
    if version != FORMAT_VERSION {
        return Err(Error::Format(version));
    }
    Ok(bincode::deserialize_from(&mut r)?)
}
