//! Track files
//!
//! A track file is the magic line `DCTRK1\n` followed by samples, each
//! `value: i64 LE | timescale: u32 LE | len: u32 LE | payload`. Sample times
//! are strictly increasing.

use crate::media_time::MediaTime;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

pub const TRACK_MAGIC: &[u8; 7] = b"DCTRK1\n";

/// One sample read back from a track file
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSample {
    pub time: MediaTime,
    pub payload: Vec<u8>,
}

/// Appends samples to a track file
pub struct TrackWriter {
    out: BufWriter<File>,
    count: u64,
    last_time: Option<MediaTime>,
}

impl TrackWriter {
    /// Create `path`, failing if it already exists
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::options().write(true).create_new(true).open(path)?;
        let mut out = BufWriter::new(file);
        out.write_all(TRACK_MAGIC)?;
        Ok(Self {
            out,
            count: 0,
            last_time: None,
        })
    }

    pub fn write_sample(&mut self, time: MediaTime, payload: &[u8]) -> io::Result<()> {
        if let Some(last) = self.last_time {
            if time <= last {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("sample time {time} does not follow {last}"),
                ));
            }
        }
        let len = u32::try_from(payload.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "sample larger than 4 GiB"))?;

        self.out.write_all(&time.value.to_le_bytes())?;
        self.out.write_all(&time.timescale.to_le_bytes())?;
        self.out.write_all(&len.to_le_bytes())?;
        self.out.write_all(payload)?;

        self.count += 1;
        self.last_time = Some(time);
        Ok(())
    }

    pub fn sample_count(&self) -> u64 {
        self.count
    }

    pub fn last_time(&self) -> Option<MediaTime> {
        self.last_time
    }

    /// Flush and sync to disk
    pub fn finish(mut self) -> io::Result<u64> {
        self.out.flush()?;
        self.out.get_ref().sync_all()?;
        Ok(self.count)
    }
}

/// Read every sample of a track file
pub fn read_track(path: &Path) -> io::Result<Vec<TrackSample>> {
    let mut input = BufReader::new(File::open(path)?);

    let mut magic = [0u8; 7];
    input.read_exact(&mut magic)?;
    if &magic != TRACK_MAGIC {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "not a track file"));
    }

    let mut samples = Vec::new();
    loop {
        let mut value = [0u8; 8];
        match input.read_exact(&mut value) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e),
        }
        let mut timescale = [0u8; 4];
        input.read_exact(&mut timescale)?;
        let mut len = [0u8; 4];
        input.read_exact(&mut len)?;

        // Sized by what is actually read, not by the header
        let len = u32::from_le_bytes(len) as usize;
        let mut payload = Vec::new();
        (&mut input).take(len as u64).read_to_end(&mut payload)?;
        if payload.len() != len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("sample truncated: {} of {} bytes", payload.len(), len),
            ));
        }

        samples.push(TrackSample {
            time: MediaTime::new(i64::from_le_bytes(value), u32::from_le_bytes(timescale)),
            payload,
        });
    }
    Ok(samples)
}
