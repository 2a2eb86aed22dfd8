use crate::core::models::system::MolecularSystem;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Defines the interface for reading and writing molecular file formats.
///
/// Readers and writers are stateless; everything that changes their behaviour is
/// passed in through the format's option types.
pub trait MolecularFile {
    /// The type of metadata associated with the file format.
    type Metadata;

    /// Options controlling how a file is parsed.
    type ReadOptions;

    /// Options controlling how a file is written.
    type WriteOptions: Default;

    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Reads a molecular system from a buffered reader.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails or I/O operations encounter issues.
    fn read_from(
        reader: &mut impl BufRead,
        options: &Self::ReadOptions,
    ) -> Result<(MolecularSystem, Self::Metadata), Self::Error>;

    /// Writes a molecular system and metadata to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the system cannot be represented in the format or the
    /// writer fails.
    fn write_to(
        system: &MolecularSystem,
        metadata: &Self::Metadata,
        options: &Self::WriteOptions,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error>;

    /// Writes a molecular system to a writer with empty metadata and default options.
    fn write_system_to(
        system: &MolecularSystem,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error>;

    /// Reads a molecular system from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsing fails.
    fn read_from_path<P: AsRef<Path>>(
        path: P,
        options: &Self::ReadOptions,
    ) -> Result<(MolecularSystem, Self::Metadata), Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader, options)
    }

    /// Reads a molecular system from an in-memory string.
    fn read_from_str(
        content: &str,
        options: &Self::ReadOptions,
    ) -> Result<(MolecularSystem, Self::Metadata), Self::Error> {
        let mut reader = content.as_bytes();
        Self::read_from(&mut reader, options)
    }

    /// Writes a molecular system and metadata to a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or writing fails.
    fn write_to_path<P: AsRef<Path>>(
        system: &MolecularSystem,
        metadata: &Self::Metadata,
        options: &Self::WriteOptions,
        path: P,
    ) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(system, metadata, options, &mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Serializes a molecular system to a string with empty metadata and default options.
    fn write_system_to_string(system: &MolecularSystem) -> Result<String, Self::Error> {
        let mut buffer = Vec::new();
        Self::write_system_to(system, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
