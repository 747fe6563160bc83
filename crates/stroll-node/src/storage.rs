//! RocksDB-backed record, match, and team storage.
//!
//! Implements [`RecordStore`], [`MatchRegistry`], and [`TeamDirectory`] using
//! RocksDB column families for defences, attacks, matches, teams, and
//! metadata. Values are `bincode` encoded.
//!
//! Records are append-only. Every insert takes the next value of a sequence
//! counter kept in `metadata` and stores it big-endian at the end of the key,
//! so the latest record of a team/round (or match) is the last key under its
//! prefix.

use std::path::Path;

use parking_lot::Mutex;
use rocksdb::{ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB};

use stroll_core::error::StrollError;
use stroll_core::traits::{MatchRegistry, RecordStore, TeamDirectory};
use stroll_core::types::{
    AttackRecord, DefenceRecord, Match, MatchId, Round, TeamContact, TeamId,
};
use tracing::info;

// --- Column family names ---

const CF_DEFENCES: &str = "defences";
const CF_ATTACKS: &str = "attacks";
const CF_MATCHES: &str = "matches";
const CF_TEAMS: &str = "teams";
const CF_METADATA: &str = "metadata";

/// All column family names.
const ALL_CFS: &[&str] = &[CF_DEFENCES, CF_ATTACKS, CF_MATCHES, CF_TEAMS, CF_METADATA];

// --- Metadata keys ---

const META_NEXT_SEQ: &[u8] = b"next_seq";
const META_NEXT_MATCH_ID: &[u8] = b"next_match_id";

/// RocksDB-backed persistent store for the evaluation engine.
pub struct RocksStore {
    db: DB,
    /// Serializes counter read-modify-write cycles.
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a RocksDB database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StrollError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&db_opts, path.as_ref(), cf_descriptors)
            .map_err(|e| StrollError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    /// Register a team or replace its contact details.
    pub fn put_team(&self, team: &TeamContact) -> Result<(), StrollError> {
        let cf = self.cf_handle(CF_TEAMS)?;
        self.db
            .put_cf(&cf, team.team_id.to_be_bytes(), encode(team)?)
            .map_err(|e| StrollError::Storage(e.to_string()))
    }

    /// Schedule `attacker` against `defender` for `round`.
    ///
    /// Scheduling the same triple twice returns the existing match.
    pub fn schedule_match(
        &self,
        round: Round,
        attacker: TeamId,
        defender: TeamId,
    ) -> Result<Match, StrollError> {
        let _guard = self.write_lock.lock();
        if let Some(existing) = self.resolve_match(round, attacker, defender)? {
            return Ok(existing);
        }

        let id = self.get_meta_u64(META_NEXT_MATCH_ID)?;
        let scheduled = Match {
            id,
            round,
            attacker,
            defender,
        };

        let mut batch = WriteBatch::default();
        batch.put_cf(&self.cf_handle(CF_MATCHES)?, id.to_be_bytes(), encode(&scheduled)?);
        batch.put_cf(
            &self.cf_handle(CF_METADATA)?,
            META_NEXT_MATCH_ID,
            (id + 1).to_le_bytes(),
        );
        self.db
            .write(batch)
            .map_err(|e| StrollError::Storage(e.to_string()))?;

        info!(match_id = id, round, attacker, defender, "match scheduled");
        Ok(scheduled)
    }

    /// Schedule every `(attacker, defender)` pair for `round` in one write.
    ///
    /// Unlike [`schedule_match`](Self::schedule_match) this does not look for
    /// existing triples; callers pass a round with no matches yet.
    pub fn schedule_round(
        &self,
        round: Round,
        pairs: &[(TeamId, TeamId)],
    ) -> Result<Vec<Match>, StrollError> {
        let _guard = self.write_lock.lock();
        let first_id = self.get_meta_u64(META_NEXT_MATCH_ID)?;
        let cf = self.cf_handle(CF_MATCHES)?;

        let mut batch = WriteBatch::default();
        let mut scheduled = Vec::with_capacity(pairs.len());
        for (id, &(attacker, defender)) in (first_id..).zip(pairs) {
            let m = Match {
                id,
                round,
                attacker,
                defender,
            };
            batch.put_cf(&cf, id.to_be_bytes(), encode(&m)?);
            scheduled.push(m);
        }
        batch.put_cf(
            &self.cf_handle(CF_METADATA)?,
            META_NEXT_MATCH_ID,
            (first_id + pairs.len() as u64).to_le_bytes(),
        );
        self.db
            .write(batch)
            .map_err(|e| StrollError::Storage(e.to_string()))?;
        Ok(scheduled)
    }

    /// Every scheduled match, ordered by id.
    pub fn matches(&self) -> Result<Vec<Match>, StrollError> {
        self.decode_all(CF_MATCHES)
    }

    /// Flush all in-memory buffers to disk.
    pub fn flush(&self) -> Result<(), StrollError> {
        self.db
            .flush()
            .map_err(|e| StrollError::Storage(e.to_string()))
    }

    // --- Internal helpers ---

    /// Get a u64 from the metadata column family.
    fn get_meta_u64(&self, key: &[u8]) -> Result<u64, StrollError> {
        let cf = self.cf_handle(CF_METADATA)?;
        match self
            .db
            .get_cf(&cf, key)
            .map_err(|e| StrollError::Storage(e.to_string()))?
        {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| StrollError::Storage("invalid metadata value length".into()))?;
                Ok(u64::from_le_bytes(raw))
            }
            None => Ok(0),
        }
    }

    /// Get a column family handle.
    fn cf_handle(&self, name: &str) -> Result<&rocksdb::ColumnFamily, StrollError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StrollError::Storage(format!("missing column family: {name}")))
    }

    /// Append `value` under `prefix || seq` and bump the sequence counter.
    fn append(&self, cf_name: &str, prefix: &[u8], value: Vec<u8>) -> Result<u64, StrollError> {
        let _guard = self.write_lock.lock();
        let seq = self.get_meta_u64(META_NEXT_SEQ)?;

        let mut key = prefix.to_vec();
        key.extend_from_slice(&seq.to_be_bytes());

        let mut batch = WriteBatch::default();
        batch.put_cf(&self.cf_handle(cf_name)?, key, value);
        batch.put_cf(
            &self.cf_handle(CF_METADATA)?,
            META_NEXT_SEQ,
            (seq + 1).to_le_bytes(),
        );
        self.db
            .write(batch)
            .map_err(|e| StrollError::Storage(e.to_string()))?;
        Ok(seq)
    }

    /// Value of the highest key starting with `prefix`, if any.
    fn last_with_prefix<T: bincode::Decode<()>>(
        &self,
        cf_name: &str,
        prefix: &[u8],
    ) -> Result<Option<T>, StrollError> {
        let cf = self.cf_handle(cf_name)?;
        let mut upper = prefix.to_vec();
        upper.extend_from_slice(&u64::MAX.to_be_bytes());

        let mut iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(upper.as_slice(), Direction::Reverse));
        match iter.next() {
            Some(item) => {
                let (key, value) = item.map_err(|e| StrollError::Storage(e.to_string()))?;
                if key.starts_with(prefix) {
                    decode(&value).map(Some)
                } else {
                    Ok(None)
                }
            }
            None => Ok(None),
        }
    }

    fn decode_all<T: bincode::Decode<()>>(&self, cf_name: &str) -> Result<Vec<T>, StrollError> {
        let cf = self.cf_handle(cf_name)?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| StrollError::Storage(e.to_string()))?;
            out.push(decode(&value)?);
        }
        Ok(out)
    }

    /// Key prefix of the defences of `team` in `round`.
    fn defence_prefix(team: TeamId, round: Round) -> [u8; 8] {
        let mut prefix = [0u8; 8];
        prefix[..4].copy_from_slice(&team.to_be_bytes());
        prefix[4..].copy_from_slice(&round.to_be_bytes());
        prefix
    }
}

fn encode<T: bincode::Encode>(value: &T) -> Result<Vec<u8>, StrollError> {
    bincode::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| StrollError::Storage(e.to_string()))
}

fn decode<T: bincode::Decode<()>>(bytes: &[u8]) -> Result<T, StrollError> {
    bincode::decode_from_slice(bytes, bincode::config::standard())
        .map(|(value, _)| value)
        .map_err(|e| StrollError::Storage(e.to_string()))
}

impl RecordStore for RocksStore {
    fn insert_defence(&self, record: &DefenceRecord) -> Result<(), StrollError> {
        let prefix = Self::defence_prefix(record.team_id, record.round);
        let seq = self.append(CF_DEFENCES, &prefix, encode(record)?)?;
        info!(team = record.team_id, round = record.round, seq, "defence recorded");
        Ok(())
    }

    fn insert_attack(&self, record: &AttackRecord) -> Result<(), StrollError> {
        let seq = self.append(CF_ATTACKS, &record.match_id.to_be_bytes(), encode(record)?)?;
        info!(match_id = record.match_id, seq, "attack recorded");
        Ok(())
    }

    fn latest_defence(
        &self,
        team: TeamId,
        round: Round,
    ) -> Result<Option<DefenceRecord>, StrollError> {
        self.last_with_prefix(CF_DEFENCES, &Self::defence_prefix(team, round))
    }

    fn latest_attack(&self, match_id: MatchId) -> Result<Option<AttackRecord>, StrollError> {
        self.last_with_prefix(CF_ATTACKS, &match_id.to_be_bytes())
    }
}

impl MatchRegistry for RocksStore {
    fn assigned_targets(&self, team: TeamId, round: Round) -> Result<Vec<TeamId>, StrollError> {
        Ok(self
            .matches()?
            .into_iter()
            .filter(|m| m.round == round && m.attacker == team)
            .map(|m| m.defender)
            .collect())
    }

    fn resolve_match(
        &self,
        round: Round,
        attacker: TeamId,
        defender: TeamId,
    ) -> Result<Option<Match>, StrollError> {
        Ok(self
            .matches()?
            .into_iter()
            .find(|m| m.round == round && m.attacker == attacker && m.defender == defender))
    }
}

impl TeamDirectory for RocksStore {
    fn team(&self, team: TeamId) -> Result<Option<TeamContact>, StrollError> {
        let cf = self.cf_handle(CF_TEAMS)?;
        self.db
            .get_cf(&cf, team.to_be_bytes())
            .map_err(|e| StrollError::Storage(e.to_string()))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    fn teams(&self) -> Result<Vec<TeamContact>, StrollError> {
        self.decode_all(CF_TEAMS)
    }
}
