// src/object/manager.rs

//! Installation sets
//!
//! A package carries one or two installation sets (A/B updates). The i-th
//! object of every set describes the same file, so objects are kept as
//! entries of parallel [`Object`]s. Symmetric options hold the same value
//! across an entry; asymmetric ones (`target`, `target-path`) differ per set.
//!
//! Entries are kept sorted by filename.

use super::{Mode, Object};
use crate::error::{Error, Result};
use crate::options::registry;
use crate::progress::TransferProgress;
use serde_json::{Map, Value};
use tracing::debug;

/// Parallel objects sharing one index, one per installation set
#[derive(Debug, Clone)]
pub struct ObjectEntry {
    objects: Vec<Object>,
}

impl ObjectEntry {
    pub fn objects(&self) -> &[Object] {
        &self.objects
    }

    pub fn filename(&self) -> &str {
        self.objects.first().map(Object::filename).unwrap_or_default()
    }

    /// Every symmetric, non-volatile option must agree across the entry
    fn check_symmetry(&self) -> Result<()> {
        let Some((first, rest)) = self.objects.split_first() else {
            return Ok(());
        };
        for other in rest {
            if other.mode() != first.mode() {
                return Err(Error::InvalidOption(format!(
                    "{}: mode differs between installation sets ({} and {})",
                    first.filename(),
                    first.mode(),
                    other.mode()
                )));
            }
            for decl in registry::all() {
                if !decl.symmetric || decl.volatile {
                    continue;
                }
                if first.get(decl.metadata) != other.get(decl.metadata) {
                    return Err(Error::InvalidOption(format!(
                        "{}: {} must be the same in every installation set",
                        first.filename(),
                        decl.metadata
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Objects of a package, as one or two installation sets
#[derive(Debug, Clone)]
pub struct ObjectsManager {
    n_sets: usize,
    entries: Vec<ObjectEntry>,
}

impl ObjectsManager {
    /// Empty manager with `n_sets` installation sets (1 or 2)
    pub fn new(n_sets: usize) -> Result<Self> {
        if !(1..=2).contains(&n_sets) {
            return Err(Error::InvalidOption(format!(
                "a package has 1 or 2 installation sets, not {}",
                n_sets
            )));
        }
        Ok(Self {
            n_sets,
            entries: Vec::new(),
        })
    }

    /// Rebuild from the per-set arrays of a template or metadata document
    pub fn from_dump(sets: &[Value]) -> Result<Self> {
        let mut manager = Self::new(sets.len())?;
        let mut columns = Vec::with_capacity(sets.len());
        for (index, set) in sets.iter().enumerate() {
            let objects = set.as_array().ok_or_else(|| {
                Error::InvalidOption(format!("installation set {} is not a list", index))
            })?;
            columns.push(objects);
        }

        let len = columns.first().map(|set| set.len()).unwrap_or_default();
        if columns.iter().any(|set| set.len() != len) {
            return Err(Error::InvalidOption(
                "installation sets must hold the same number of objects".to_string(),
            ));
        }

        for index in 0..len {
            let mut objects = Vec::with_capacity(columns.len());
            for set in &columns {
                let entry = set[index].as_object().ok_or_else(|| {
                    Error::InvalidOption(format!("object {} is not a JSON object", index))
                })?;
                objects.push(Object::from_map(entry)?);
            }
            let entry = ObjectEntry { objects };
            entry.check_symmetry()?;
            manager.entries.push(entry);
        }
        manager
            .entries
            .sort_by(|a, b| a.filename().cmp(b.filename()));
        debug!("Loaded {} objects in {} installation sets", len, manager.n_sets);
        Ok(manager)
    }

    pub fn n_sets(&self) -> usize {
        self.n_sets
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ObjectEntry] {
        &self.entries
    }

    /// Add an object to every installation set and return its index
    ///
    /// A list value with exactly one element per installation set is
    /// distributed positionally; any other value is replicated.
    pub fn create(&mut self, mode: Mode, options: &Map<String, Value>) -> Result<usize> {
        let mut objects = Vec::with_capacity(self.n_sets);
        for set_index in 0..self.n_sets {
            let set_options: Map<String, Value> = options
                .iter()
                .map(|(name, value)| {
                    let value = match value {
                        Value::Array(values) if values.len() == self.n_sets => {
                            values[set_index].clone()
                        }
                        other => other.clone(),
                    };
                    (name.clone(), value)
                })
                .collect();
            objects.push(Object::new(mode, &set_options)?);
        }

        let entry = ObjectEntry { objects };
        entry.check_symmetry()?;
        let index = self
            .entries
            .partition_point(|existing| existing.filename() <= entry.filename());
        debug!("Adding {} at index {}", entry.filename(), index);
        self.entries.insert(index, entry);
        Ok(index)
    }

    pub fn entry(&self, index: usize) -> Result<&ObjectEntry> {
        self.entries
            .get(index)
            .ok_or_else(|| Error::NotFound(format!("object {} does not exist", index)))
    }

    /// Object `index` of installation set `set_index`
    pub fn get(&self, index: usize, set_index: usize) -> Result<&Object> {
        self.entry(index)?
            .objects
            .get(set_index)
            .ok_or_else(|| Error::NotFound(format!("installation set {} does not exist", set_index)))
    }

    pub fn get_mut(&mut self, index: usize, set_index: usize) -> Result<&mut Object> {
        self.entries
            .get_mut(index)
            .ok_or_else(|| Error::NotFound(format!("object {} does not exist", index)))?
            .objects
            .get_mut(set_index)
            .ok_or_else(|| Error::NotFound(format!("installation set {} does not exist", set_index)))
    }

    /// Change an option of an object and return the object's new index
    ///
    /// Symmetric options change in every installation set and take no set
    /// index. Asymmetric options change in one set, which must be given when
    /// the package has more than one. Nothing changes on error.
    pub fn update(
        &mut self,
        index: usize,
        option: &str,
        value: &Value,
        set_index: Option<usize>,
    ) -> Result<usize> {
        let decl = registry::get(option).ok_or_else(|| {
            Error::InvalidOption(format!("{} is not a valid option", option))
        })?;
        let mut entry = self.entry(index)?.clone();

        if decl.symmetric {
            if set_index.is_some() {
                return Err(Error::InvalidOption(format!(
                    "{} is shared by every installation set and takes no set index",
                    option
                )));
            }
            for object in &mut entry.objects {
                object.update(option, value)?;
            }
        } else {
            let set_index = match set_index {
                Some(set_index) => set_index,
                None if self.n_sets == 1 => 0,
                None => {
                    return Err(Error::InvalidOption(format!(
                        "{} differs per installation set; a set index is required",
                        option
                    )));
                }
            };
            entry
                .objects
                .get_mut(set_index)
                .ok_or_else(|| {
                    Error::NotFound(format!("installation set {} does not exist", set_index))
                })?
                .update(option, value)?;
        }

        let renamed = entry.filename() != self.entries[index].filename();
        self.entries[index] = entry;
        if !renamed {
            return Ok(index);
        }

        let entry = self.entries.remove(index);
        let new_index = self
            .entries
            .partition_point(|existing| existing.filename() <= entry.filename());
        self.entries.insert(new_index, entry);
        Ok(new_index)
    }

    /// Remove an object from every installation set
    pub fn remove(&mut self, index: usize) -> Result<ObjectEntry> {
        self.entry(index)?;
        Ok(self.entries.remove(index))
    }

    /// Objects of one installation set, in order
    pub fn set(&self, set_index: usize) -> impl Iterator<Item = &Object> {
        self.entries
            .iter()
            .filter_map(move |entry| entry.objects.get(set_index))
    }

    /// Every object of every installation set, set by set
    pub fn all(&self) -> impl Iterator<Item = &Object> {
        (0..self.n_sets).flat_map(move |set_index| self.set(set_index))
    }

    pub fn all_mut(&mut self) -> impl Iterator<Item = &mut Object> {
        self.entries.iter_mut().flat_map(|entry| entry.objects.iter_mut())
    }

    pub fn set_chunk_size(&mut self, chunk_size: usize) {
        for object in self.all_mut() {
            object.set_chunk_size(chunk_size);
        }
    }

    /// Per-set metadata lists, loading objects as needed
    pub fn to_metadata(&mut self, progress: Option<&dyn TransferProgress>) -> Result<Value> {
        let mut sets = vec![Vec::with_capacity(self.entries.len()); self.n_sets];
        for entry in &mut self.entries {
            for (set_index, object) in entry.objects.iter_mut().enumerate() {
                sets[set_index].push(Value::Object(object.to_metadata(progress)?));
            }
        }
        Ok(Value::Array(sets.into_iter().map(Value::Array).collect()))
    }

    /// Per-set template lists
    pub fn to_template(&self) -> Value {
        let sets = (0..self.n_sets)
            .map(|set_index| {
                Value::Array(
                    self.set(set_index)
                        .map(|object| Value::Object(object.to_template()))
                        .collect(),
                )
            })
            .collect();
        Value::Array(sets)
    }
}

impl Default for ObjectsManager {
    fn default() -> Self {
        Self {
            n_sets: 2,
            entries: Vec::new(),
        }
    }
}
