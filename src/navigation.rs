//! Navigation boundary between the session core and whatever renders views.
//!
//! The guard and gate never render anything; they ask a `Navigator` to move the user.
//! `History` is the in-process implementation used by the shell, the CLI and tests.

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationMode {
    /// New history entry.
    Push,
    /// Overwrite the current entry; back cannot return to it.
    Replace,
    /// Full reload: new entry and all in-memory view state dropped.
    Reload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub path: String,
    pub mode: NavigationMode,
}

impl Navigation {
    pub fn push(path: impl Into<String>) -> Self {
        Self { path: path.into(), mode: NavigationMode::Push }
    }

    pub fn replace(path: impl Into<String>) -> Self {
        Self { path: path.into(), mode: NavigationMode::Replace }
    }

    pub fn reload(path: impl Into<String>) -> Self {
        Self { path: path.into(), mode: NavigationMode::Reload }
    }
}

pub trait Navigator: Send + Sync {
    fn navigate(&self, nav: Navigation);
}

#[derive(Debug, Default)]
struct HistoryState {
    entries: Vec<String>,
    log: Vec<Navigation>,
    generation: u64,
}

/// Recording history stack.
#[derive(Debug, Default)]
pub struct History {
    state: Mutex<HistoryState>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(path: impl Into<String>) -> Self {
        let h = Self::new();
        h.state.lock().entries.push(path.into());
        h
    }

    pub fn current(&self) -> Option<String> {
        self.state.lock().entries.last().cloned()
    }

    pub fn entries(&self) -> Vec<String> {
        self.state.lock().entries.clone()
    }

    /// Every navigation requested so far, in order.
    pub fn navigations(&self) -> Vec<Navigation> {
        self.state.lock().log.clone()
    }

    pub fn count_to(&self, path: &str, mode: NavigationMode) -> usize {
        self.state.lock().log.iter().filter(|n| n.path == path && n.mode == mode).count()
    }

    /// Number of full reloads; anything cached before the last one is stale.
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Pops the current entry and returns the one now current.
    pub fn back(&self) -> Option<String> {
        let mut st = self.state.lock();
        if st.entries.len() <= 1 {
            return None;
        }
        st.entries.pop();
        st.entries.last().cloned()
    }
}

impl Navigator for History {
    fn navigate(&self, nav: Navigation) {
        let mut st = self.state.lock();
        match nav.mode {
            NavigationMode::Push => st.entries.push(nav.path.clone()),
            NavigationMode::Replace => match st.entries.last_mut() {
                Some(top) => *top = nav.path.clone(),
                None => st.entries.push(nav.path.clone()),
            },
            NavigationMode::Reload => {
                st.entries.push(nav.path.clone());
                st.generation += 1;
            }
        }
        tracing::debug!(path = %nav.path, mode = ?nav.mode, "navigate");
        st.log.push(nav);
    }
}
