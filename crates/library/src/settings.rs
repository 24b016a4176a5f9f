use metadata::ExtractPolicy;

use crate::preference::PreferenceTable;

pub const DEFAULT_MAX_CONCURRENT_LOADS: usize = 5;

#[derive(Clone, Debug)]
pub struct LoaderSettings {
    pub max_concurrent_loads: usize,
    pub stream_audio: bool,
    pub extract: ExtractPolicy,
    pub preferences: PreferenceTable,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            max_concurrent_loads: DEFAULT_MAX_CONCURRENT_LOADS,
            stream_audio: true,
            extract: ExtractPolicy::default(),
            preferences: PreferenceTable::default(),
        }
    }
}

impl LoaderSettings {
    pub fn max_concurrent_loads(&self) -> usize {
        self.max_concurrent_loads.max(1)
    }
}
