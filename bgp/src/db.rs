// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The database of locally announced prefixes. Each prefix maps to the
//! UPDATE that announced it, so the announcement can be replayed verbatim
//! after a reconnect.

use crate::error::Error;
use crate::lock;
use crate::messages::UpdateMessage;
use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct PrefixDb {
    entries: Mutex<BTreeMap<String, UpdateMessage>>,
}

impl PrefixDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new prefix. Fails, leaving the database untouched, if the
    /// prefix is already present.
    pub fn insert(
        &self,
        prefix: &str,
        update: UpdateMessage,
    ) -> Result<(), Error> {
        let mut entries = lock!(self.entries);
        if entries.contains_key(prefix) {
            return Err(Error::PrefixExists(prefix.to_owned()));
        }
        entries.insert(prefix.to_owned(), update);
        Ok(())
    }

    /// Stop tracking a prefix, handing back the update that announced it.
    pub fn remove(&self, prefix: &str) -> Result<UpdateMessage, Error> {
        lock!(self.entries)
            .remove(prefix)
            .ok_or_else(|| Error::PrefixNotFound(prefix.to_owned()))
    }

    pub fn contains(&self, prefix: &str) -> bool {
        lock!(self.entries).contains_key(prefix)
    }

    /// A copy of every stored announcement, ordered by prefix.
    pub fn announcements(&self) -> Vec<UpdateMessage> {
        lock!(self.entries).values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        lock!(self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock!(self.entries).is_empty()
    }
}
