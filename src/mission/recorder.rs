//! Writing live telemetry to a mission file.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use bytes::{BufMut, BytesMut};
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::mission::{
    Flight, SD_BLOCK_HEADER_LENGTH, SECTOR_SIZE, SuperBlock, encode_log_block, encode_spacer,
    filepath_for_proposed_name,
};
use crate::protocol::transmission::ParsedBlock;

/// Records blocks into a mission file, one sector at a time.
///
/// The super block is rewritten after every sector so that an interrupted
/// recording stays readable.
#[derive(Debug)]
pub struct MissionRecorder {
    file: File,
    path: PathBuf,
    super_block: SuperBlock,
    sector: BytesMut,
}

impl MissionRecorder {
    /// Creates a new mission file named after `name` in `missions_dir`.
    ///
    /// `epoch` is the start of the recording in seconds since the Unix epoch.
    pub async fn create(missions_dir: &Path, name: &str, epoch: i64) -> Result<Self> {
        tokio::fs::create_dir_all(missions_dir).await?;
        let path = filepath_for_proposed_name(name, missions_dir).await?;

        let mut super_block = SuperBlock {
            partition_length: 1,
            ..SuperBlock::default()
        };
        super_block.flights[0] = Flight {
            first_block: 1,
            num_blocks: 0,
            timestamp: u32::try_from(epoch).unwrap_or_default(),
        };

        let mut file = File::create(&path).await?;
        file.write_all(&super_block.encode()).await?;
        file.flush().await?;

        tracing::info!("recording mission to {}", path.display());

        Ok(Self {
            file,
            path,
            super_block,
            sector: BytesMut::with_capacity(SECTOR_SIZE),
        })
    }

    /// Path of the file being written.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mission name, taken from the file name.
    #[must_use]
    pub fn name(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Number of complete sectors written.
    #[must_use]
    pub const fn sectors_written(&self) -> u32 {
        self.super_block.flights[0].num_blocks
    }

    /// Appends a block.
    ///
    /// A block that does not fit the current sector starts a new one. A
    /// block larger than a sector is rejected and nothing is written.
    pub async fn record(&mut self, block: &ParsedBlock) -> Result<()> {
        let encoded = encode_log_block(&block.contents);
        if encoded.len() > SECTOR_SIZE {
            tracing::warn!(
                "not recording {} block of {} bytes",
                block.name(),
                encoded.len()
            );
            return Err(Error::LogBlockTooLarge {
                length: encoded.len(),
                sector_size: SECTOR_SIZE,
            });
        }

        if self.sector.len() + encoded.len() > SECTOR_SIZE {
            self.flush_sector().await?;
        }
        self.sector.put_slice(&encoded);
        if self.sector.len() == SECTOR_SIZE {
            self.flush_sector().await?;
        }
        Ok(())
    }

    /// Pads the current sector with a spacer and writes it out.
    async fn flush_sector(&mut self) -> Result<()> {
        if self.sector.is_empty() {
            return Ok(());
        }

        let remaining = SECTOR_SIZE - self.sector.len();
        if remaining >= SD_BLOCK_HEADER_LENGTH {
            self.sector.put_slice(&encode_spacer(remaining));
        } else {
            self.sector.resize(SECTOR_SIZE, 0);
        }

        let flight = &mut self.super_block.flights[0];
        let offset = u64::from(flight.first_block + flight.num_blocks) * SECTOR_SIZE as u64;
        flight.num_blocks += 1;
        self.super_block.partition_length = flight.first_block + flight.num_blocks;

        self.file.seek(SeekFrom::Start(offset)).await?;
        self.file.write_all(&self.sector).await?;
        self.sector.clear();

        self.file.seek(SeekFrom::Start(0)).await?;
        self.file.write_all(&self.super_block.encode()).await?;
        self.file.flush().await?;

        tracing::trace!(
            "wrote sector {} of {}",
            self.super_block.flights[0].num_blocks,
            self.path.display()
        );
        Ok(())
    }

    /// Flushes the last sector and closes the file.
    ///
    /// Returns the path of the finished recording.
    pub async fn finish(mut self) -> Result<PathBuf> {
        self.flush_sector().await?;
        self.file.sync_all().await?;
        tracing::info!(
            "finished recording {} ({} sectors)",
            self.path.display(),
            self.sectors_written()
        );
        Ok(self.path)
    }
}
