// autosync-common: types shared between the daemon and its API clients.

pub mod types;
