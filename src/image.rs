//! Program images.
//!
//! An image is a binary file made of big-endian 16-bit words:
//! the first word is the origin (the address to load the program at)
//! and every word after it is placed in consecutive memory locations starting at the origin.
//!
//! ```
//! use lc3_vm::image::ImageFile;
//!
//! let image = ImageFile::parse(&[0x30, 0x00, 0xF0, 0x25]).unwrap();
//! assert_eq!(image.origin(), 0x3000);
//! assert_eq!(image.words(), &[0xF025]);
//! assert_eq!(image.to_bytes(), [0x30, 0x00, 0xF0, 0x25]);
//! ```
use std::path::Path;

use crate::sim::mem::MEM_SIZE;

/// Errors that can occur when loading a program image.
#[derive(Debug)]
pub enum ImageErr {
    /// The image file could not be read.
    Io(std::io::Error),
    /// The image is shorter than one word, so it has no origin.
    MissingOrigin,
}
impl std::fmt::Display for ImageErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageErr::Io(e)         => write!(f, "could not read image: {e}"),
            ImageErr::MissingOrigin => f.write_str("image is missing its origin"),
        }
    }
}
impl std::error::Error for ImageErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImageErr::Io(e) => Some(e),
            ImageErr::MissingOrigin => None,
        }
    }
}
impl From<std::io::Error> for ImageErr {
    fn from(value: std::io::Error) -> Self {
        ImageErr::Io(value)
    }
}

/// A program image: an origin and the words to place starting there.
///
/// Invariant: the words fit between the origin and the end of memory.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ImageFile {
    origin: u16,
    words: Vec<u16>
}
impl ImageFile {
    /// Creates an image from its origin and words.
    ///
    /// Words which would fall past the end of memory are dropped.
    pub fn new(origin: u16, mut words: Vec<u16>) -> Self {
        let room = MEM_SIZE - usize::from(origin);
        if words.len() > room {
            log::warn!(
                "image at x{origin:04X} does not fit in memory, dropping its last {} words",
                words.len() - room
            );
            words.truncate(room);
        }

        Self { origin, words }
    }

    /// Parses an image from its binary form.
    ///
    /// A trailing odd byte is ignored.
    pub fn parse(bytes: &[u8]) -> Result<Self, ImageErr> {
        let mut chunks = bytes.chunks_exact(2);
        let mut words = chunks.by_ref()
            .map(|c| u16::from_be_bytes([c[0], c[1]]));

        let origin = words.next().ok_or(ImageErr::MissingOrigin)?;
        let words: Vec<_> = words.collect();

        if !chunks.remainder().is_empty() {
            log::warn!("image at x{origin:04X} has an odd number of bytes, ignoring the last byte");
        }

        Ok(Self::new(origin, words))
    }

    /// Reads and parses the image at the given path.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, ImageErr> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let image = Self::parse(&bytes)?;

        log::debug!("read {} ({} words at x{:04X})", path.display(), image.words.len(), image.origin);
        Ok(image)
    }

    /// The address the image loads at.
    pub fn origin(&self) -> u16 {
        self.origin
    }

    /// The words of the image.
    pub fn words(&self) -> &[u16] {
        &self.words
    }

    /// Writes the image in its binary form.
    pub fn to_bytes(&self) -> Vec<u8> {
        std::iter::once(self.origin)
            .chain(self.words.iter().copied())
            .flat_map(u16::to_be_bytes)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::reg_consts::R0;
    use crate::sim::Simulator;

    use super::{ImageErr, ImageFile};

    #[test]
    fn test_parse() {
        let image = ImageFile::parse(&[0x30, 0x00, 0x10, 0x25, 0xF0, 0x25]).unwrap();
        assert_eq!(image.origin(), 0x3000);
        assert_eq!(image.words(), &[0x1025, 0xF025]);

        // origin only
        let image = ImageFile::parse(&[0x40, 0x00]).unwrap();
        assert_eq!(image.origin(), 0x4000);
        assert!(image.words().is_empty());
    }

    #[test]
    fn test_parse_missing_origin() {
        assert!(matches!(ImageFile::parse(&[]), Err(ImageErr::MissingOrigin)));
        assert!(matches!(ImageFile::parse(&[0x30]), Err(ImageErr::MissingOrigin)));
    }

    #[test]
    fn test_parse_odd_length() {
        let image = ImageFile::parse(&[0x30, 0x00, 0x12, 0x34, 0x56]).unwrap();
        assert_eq!(image.words(), &[0x1234]);
    }

    #[test]
    fn test_truncates_at_end_of_memory() {
        let image = ImageFile::parse(&[0xFF, 0xFE, 0, 1, 0, 2, 0, 3]).unwrap();
        assert_eq!(image.words(), &[1, 2]);

        let image = ImageFile::new(0xFFFF, vec![7; 10]);
        assert_eq!(image.words(), &[7]);
    }

    #[test]
    fn test_to_bytes() {
        let image = ImageFile::new(0x3000, vec![0x1025, 0xF025]);
        let bytes = image.to_bytes();
        assert_eq!(bytes, [0x30, 0x00, 0x10, 0x25, 0xF0, 0x25]);
        assert_eq!(ImageFile::parse(&bytes).unwrap(), image);
    }

    #[test]
    fn test_read_missing_file() {
        let result = ImageFile::read("this/path/does/not/exist.obj");
        assert!(matches!(result, Err(ImageErr::Io(_))));
    }

    #[test]
    fn test_later_images_overwrite() {
        let mut sim = Simulator::new(Default::default());
        sim.load_image(&ImageFile::new(0x3000, vec![0x1025, 0xF025, 0x1111]));
        sim.load_image(&ImageFile::new(0x3001, vec![0x1021, 0xF025]));

        assert_eq!(&sim.mem.as_slice()[0x3000..0x3003], &[0x1025, 0x1021, 0xF025]);

        sim.run().unwrap();
        assert!(sim.hit_halt());
        assert_eq!(sim.reg_file[R0], 6);
    }
}
