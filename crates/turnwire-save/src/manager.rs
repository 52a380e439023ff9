//! Save/load pipeline: versioned header, state snapshot, delegate
//! records, gzip container.
//!
//! Stream layout, inside the gzip container:
//!
//! ```text
//! [version section]
//! [state snapshot section]
//! ( START marker, name, display name, kind, DATA marker, blob )*
//! END marker
//! ```
//!
//! The format is not self-describing beyond the version token: any
//! structural change to the snapshot needs a new version number or a
//! migration rule. That is the accepted tradeoff for a compact,
//! dead-simple reader.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::format::{
    MARKER_DELEGATE_DATA, MARKER_DELEGATE_START, MARKER_END, expect_marker,
    read_marker, read_section, write_marker, write_section,
};
use crate::{
    Delegate, DelegateRegistry, EngineVersion, GameState, MigrationSet,
    SaveError,
};

/// Conventional save-file extension.
pub const SAVE_EXTENSION: &str = "svg";

/// A fully-loaded save: the version it was written by, the (possibly
/// migrated) state snapshot, and the re-created delegates.
pub struct LoadedGame {
    pub version: EngineVersion,
    pub state: GameState,
    pub delegates: Vec<Box<dyn Delegate>>,
}

impl std::fmt::Debug for LoadedGame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedGame")
            .field("version", &self.version)
            .field("state", &self.state)
            .field(
                "delegates",
                &self.delegates.iter().map(|d| d.kind()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Writes and reads the save-game stream.
///
/// One manager is configured at startup with the running engine
/// version, the single tolerated legacy version (if any), the migration
/// rules, and the delegate factory registry — then shared wherever
/// saves are made or loaded.
pub struct GameDataManager {
    version: EngineVersion,
    legacy_version: Option<EngineVersion>,
    migrations: MigrationSet,
    registry: DelegateRegistry,
}

impl GameDataManager {
    /// Creates a manager for the given running engine version, with no
    /// legacy tolerance, no migrations, and no delegate kinds.
    pub fn new(version: EngineVersion) -> Self {
        Self {
            version,
            legacy_version: None,
            migrations: MigrationSet::new(),
            registry: DelegateRegistry::new(),
        }
    }

    /// The one older version whose saves this manager will load (after
    /// migrations). Everything else is rejected outright.
    pub fn set_legacy_version(&mut self, version: EngineVersion) {
        self.legacy_version = Some(version);
    }

    /// Migration rules, for registration at startup.
    pub fn migrations_mut(&mut self) -> &mut MigrationSet {
        &mut self.migrations
    }

    /// Delegate factory registry, for registration at startup.
    pub fn delegates_mut(&mut self) -> &mut DelegateRegistry {
        &mut self.registry
    }

    // -- Save ------------------------------------------------------------

    /// Writes a complete save stream.
    ///
    /// The state read lock is held while the snapshot serializes, so
    /// the written state is point-in-time consistent even if game logic
    /// resumes mutating it the moment the lock drops. The delegates are
    /// serialized after the lock releases; they belong to the thread
    /// driving the save and are quiescent for its duration.
    pub fn save<W: Write>(
        &self,
        state: &RwLock<GameState>,
        delegates: &[Box<dyn Delegate>],
        writer: W,
    ) -> Result<(), SaveError> {
        let mut encoder = GzEncoder::new(writer, Compression::default());

        write_section(&mut encoder, &bincode::serialize(&self.version)?)?;

        {
            let snapshot = state.read().unwrap_or_else(PoisonError::into_inner);
            write_section(&mut encoder, &bincode::serialize(&*snapshot)?)?;
        }

        for delegate in delegates {
            write_marker(&mut encoder, MARKER_DELEGATE_START)?;
            write_section(&mut encoder, delegate.name().as_bytes())?;
            write_section(&mut encoder, delegate.display_name().as_bytes())?;
            write_section(&mut encoder, delegate.kind().as_bytes())?;
            write_marker(&mut encoder, MARKER_DELEGATE_DATA)?;
            write_section(&mut encoder, &delegate.save_state()?)?;
        }
        write_marker(&mut encoder, MARKER_END)?;

        encoder.finish()?;
        Ok(())
    }

    /// Saves to a file, atomically: the stream is written to a
    /// temporary sibling first and renamed over the target only once it
    /// is complete, so a failed save never corrupts a previous good
    /// one.
    pub fn save_to_path(
        &self,
        state: &RwLock<GameState>,
        delegates: &[Box<dyn Delegate>],
        path: &Path,
    ) -> Result<(), SaveError> {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = Path::new(&tmp);

        let result = File::create(tmp).map_err(SaveError::from).and_then(|file| {
            self.save(state, delegates, BufWriter::new(file))
        });
        if let Err(error) = result {
            let _ = fs::remove_file(tmp);
            return Err(error);
        }

        fs::rename(tmp, path)?;
        tracing::debug!(path = %path.display(), "save written");
        Ok(())
    }

    // -- Load ------------------------------------------------------------

    /// Reads a complete save stream.
    ///
    /// A version other than the running one or the tolerated legacy one
    /// fails before any state is constructed; a legacy save has its
    /// snapshot migrated before the delegate records are read. Any
    /// failure — unknown delegate kind, bad marker, truncated stream —
    /// fails the whole load; there is no partially-loaded result.
    pub fn load<R: Read>(&self, reader: R) -> Result<LoadedGame, SaveError> {
        let mut decoder = GzDecoder::new(reader);

        let version: EngineVersion =
            bincode::deserialize(&read_section(&mut decoder)?)?;
        if version != self.version {
            match self.legacy_version {
                Some(legacy) if version == legacy => {
                    tracing::info!(
                        found = %version,
                        running = %self.version,
                        "loading legacy save through migrations"
                    );
                }
                _ => {
                    return Err(SaveError::IncompatibleVersion {
                        found: version,
                        supported: self.supported_versions(),
                    });
                }
            }
        }

        let mut state: GameState =
            bincode::deserialize(&read_section(&mut decoder)?)?;
        if version != self.version {
            self.migrations.apply(version, &mut state);
        }

        let mut delegates = Vec::new();
        loop {
            match read_marker(&mut decoder)? {
                MARKER_END => break,
                MARKER_DELEGATE_START => {
                    delegates.push(self.read_delegate(&mut decoder)?);
                }
                other => {
                    return Err(SaveError::CorruptSave(format!(
                        "unexpected marker {other:#04x} between delegate records"
                    )));
                }
            }
        }

        Ok(LoadedGame {
            version,
            state,
            delegates,
        })
    }

    /// Loads a save file written by [`save_to_path`](Self::save_to_path).
    pub fn load_from_path(&self, path: &Path) -> Result<LoadedGame, SaveError> {
        let file = File::open(path)?;
        self.load(BufReader::new(file))
    }

    fn read_delegate<R: Read>(
        &self,
        reader: &mut R,
    ) -> Result<Box<dyn Delegate>, SaveError> {
        let name = read_utf8_section(reader, "delegate name")?;
        let display_name = read_utf8_section(reader, "delegate display name")?;
        let kind = read_utf8_section(reader, "delegate kind")?;
        expect_marker(reader, MARKER_DELEGATE_DATA)?;
        let blob = read_section(reader)?;

        let mut delegate = self.registry.create(&kind)?;
        delegate.initialize(&name, &display_name);
        delegate.load_state(&blob)?;
        Ok(delegate)
    }

    fn supported_versions(&self) -> String {
        match self.legacy_version {
            Some(legacy) => format!("{} (legacy {legacy})", self.version),
            None => self.version.to_string(),
        }
    }
}

fn read_utf8_section<R: Read>(reader: &mut R, what: &str) -> Result<String, SaveError> {
    String::from_utf8(read_section(reader)?)
        .map_err(|_| SaveError::CorruptSave(format!("{what} is not UTF-8")))
}
