use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::Path;
use memmap2::Mmap;
use crate::error::TraceError;

/// The bytes of a trace file. Empty files can't be mapped and have nothing to read
pub enum TraceSource {
    Mapped(Cursor<Mmap>),
    Empty(io::Empty),
}

impl Read for TraceSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            TraceSource::Mapped(m) => m.read(buf),
            TraceSource::Empty(e) => e.read(buf),
        }
    }
}

pub fn get_reader(path: &Path) -> Result<TraceSource, TraceError> {
    let file = File::open(path).map_err(|source| TraceError::Open { path: path.to_path_buf(), source })?;
    let len = file.metadata().map_err(|source| TraceError::Open { path: path.to_path_buf(), source })?.len();
    if len == 0 {
        return Ok(TraceSource::Empty(io::empty()));
    }
    map_file(path, &file)
}

#[cfg(unix)]
fn map_file(path: &Path, file: &File) -> Result<TraceSource, TraceError> {
    use memmap2::Advice;
    // The file is only ever read front to back, and traces are not modified while being simulated
    unsafe {
        let m = Mmap::map(file).map_err(|source| TraceError::Map { path: path.to_path_buf(), source })?;
        m.advise(Advice::Sequential).map_err(|source| TraceError::Map { path: path.to_path_buf(), source })?;
        Ok(TraceSource::Mapped(Cursor::new(m)))
    }
}

#[cfg(not(unix))]
fn map_file(path: &Path, file: &File) -> Result<TraceSource, TraceError> {
    let m = unsafe { Mmap::map(file) }.map_err(|source| TraceError::Map { path: path.to_path_buf(), source })?;
    Ok(TraceSource::Mapped(Cursor::new(m)))
}
