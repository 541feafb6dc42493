//! Observability of directory round trips and entry state changes.
//!
//! The library does not log on its own behalf. A [`Session`](crate::Session)
//! hands every notable event to its [`Reporter`], which by default forwards
//! them to `tracing`.

use tracing::{debug, info};

use crate::{directory::Scope, entry::State};

/// Something worth reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event<'a> {
	/// The server schema was fetched and resolved.
	SchemaLoaded {
		/// Number of attribute names known.
		attributes: usize,
	},
	/// A search was performed.
	Search {
		/// Search base.
		base: &'a str,
		/// Search scope.
		scope: Scope,
		/// Search filter.
		filter: &'a str,
		/// Number of entries returned.
		found: usize,
	},
	/// An entry was loaded from search results.
	Loaded {
		/// DN of the entry.
		dn: &'a str,
	},
	/// An entry moved between lifecycle states.
	Transition {
		/// DN of the entry.
		dn: &'a str,
		/// Previous state.
		from: State,
		/// New state.
		to: State,
	},
	/// A new entry was created in the directory.
	Created {
		/// DN of the entry.
		dn: &'a str,
	},
	/// Changes to an entry were written.
	Modified {
		/// DN of the entry.
		dn: &'a str,
		/// Number of attribute modifications sent.
		changes: usize,
	},
	/// A persist found nothing to write.
	Unchanged {
		/// DN of the entry.
		dn: &'a str,
	},
	/// An entry was removed from the directory.
	Deleted {
		/// DN of the entry.
		dn: &'a str,
	},
	/// A password was changed.
	PasswordChanged {
		/// DN of the entry.
		dn: &'a str,
	},
}

/// Receives events from a session.
pub trait Reporter: Send + Sync {
	/// Handle one event.
	fn report(&self, event: &Event<'_>);
}

/// Forwards events to `tracing`: reads at debug level, writes at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
	fn report(&self, event: &Event<'_>) {
		match *event {
			Event::SchemaLoaded { attributes } => {
				debug!("Resolved schema with {attributes} attribute names");
			}
			Event::Search { base, scope, filter, found } => {
				debug!("Search in {base} ({scope:?}) for {filter} returned {found} entries");
			}
			Event::Loaded { dn } => debug!("Loaded {dn}"),
			Event::Transition { dn, from, to } => debug!("{dn}: {from:?} -> {to:?}"),
			Event::Created { dn } => info!("Created {dn}"),
			Event::Modified { dn, changes } => info!("Modified {dn} ({changes} changes)"),
			Event::Unchanged { dn } => debug!("Nothing to write for {dn}"),
			Event::Deleted { dn } => info!("Deleted {dn}"),
			Event::PasswordChanged { dn } => info!("Changed password of {dn}"),
		}
	}
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl Reporter for NoopReporter {
	fn report(&self, _event: &Event<'_>) {}
}
