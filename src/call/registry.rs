//! Participant view registry
//!
//! Ordered view slots for the call layout: slot 0 is the local preview,
//! remote participants follow in join order. The registry is mutated only
//! on the control context; the display layer consumes full snapshots and
//! recomputes sizing from the slot count.

use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::render::surface::SurfaceHandle;
use crate::transport::ParticipantId;

/// What a view slot renders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewSource {
    /// Local composited preview
    Local(SurfaceHandle),
    /// Decoded video of a remote participant
    Remote {
        /// Participant shown in the slot
        participant: ParticipantId,
        /// Surface bound by the transport
        surface: SurfaceHandle,
    },
}

impl ViewSource {
    /// Participant for remote slots
    pub fn participant(&self) -> Option<ParticipantId> {
        match self {
            Self::Local(_) => None,
            Self::Remote { participant, .. } => Some(*participant),
        }
    }

    /// Surface rendered by the slot
    pub fn surface(&self) -> SurfaceHandle {
        match self {
            Self::Local(surface) => *surface,
            Self::Remote { surface, .. } => *surface,
        }
    }
}

/// One renderable position in the call layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewSlot {
    /// Ordinal position (0 = local)
    pub slot_index: usize,
    /// What the slot shows
    pub source: ViewSource,
}

impl ViewSlot {
    /// Check if the slot shows the local preview
    pub fn is_local(&self) -> bool {
        matches!(self.source, ViewSource::Local(_))
    }
}

/// Per-slot share of the view container
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewLayout {
    /// Number of slots laid out
    pub slots: usize,
    /// Fraction of the container each slot takes along the split axis
    pub slot_fraction: f32,
}

impl ViewLayout {
    /// Layout for `count` slots: one slot fills the container, more split it
    /// evenly
    pub fn for_count(count: usize) -> Self {
        Self {
            slots: count,
            slot_fraction: if count <= 1 { 1.0 } else { 1.0 / count as f32 },
        }
    }
}

/// Ordered collection of view slots, local first
#[derive(Debug)]
pub struct ParticipantViewRegistry {
    max_views: usize,
    local: Option<SurfaceHandle>,
    remotes: Vec<(ParticipantId, SurfaceHandle)>,
}

impl ParticipantViewRegistry {
    /// Create an empty registry holding at most `max_views` slots in total
    pub fn new(max_views: usize) -> Self {
        let max_views = max_views.max(1);
        Self {
            max_views,
            local: None,
            remotes: Vec::with_capacity(max_views - 1),
        }
    }

    /// Total slot cap including the local view
    pub fn max_views(&self) -> usize {
        self.max_views
    }

    /// Maximum number of remote slots
    pub fn max_remotes(&self) -> usize {
        self.max_views - 1
    }

    /// Put the local preview in slot 0
    pub fn attach_local(&mut self, surface: SurfaceHandle) {
        self.local = Some(surface);
    }

    /// Append a remote participant after the existing remotes.
    ///
    /// Inserting an id that is already present is a no-op. A full registry
    /// is left unchanged and reports `CapacityExceeded`.
    pub fn insert(&mut self, participant: ParticipantId, surface: SurfaceHandle) -> Result<()> {
        if self.local.is_none() {
            return Err(PipelineError::NoLocalView);
        }
        if self.contains(participant) {
            debug!(%participant, "Participant already has a view slot");
            return Ok(());
        }
        if self.is_full() {
            warn!(
                %participant,
                max_remotes = self.max_remotes(),
                "View capacity reached, participant not rendered"
            );
            return Err(PipelineError::CapacityExceeded(self.max_remotes()));
        }

        self.remotes.push((participant, surface));
        debug!(%participant, slot = self.remotes.len(), "Remote view slot added");
        Ok(())
    }

    /// Remove a remote participant's slot, returning its surface.
    ///
    /// The local slot is not reachable through this path.
    pub fn remove(&mut self, participant: ParticipantId) -> Option<SurfaceHandle> {
        let index = self.remotes.iter().position(|(id, _)| *id == participant)?;
        let (_, surface) = self.remotes.remove(index);
        debug!(%participant, "Remote view slot removed");
        Some(surface)
    }

    /// Drop every remote slot and return them in slot order
    pub fn reset_to_local(&mut self) -> Vec<(ParticipantId, SurfaceHandle)> {
        std::mem::take(&mut self.remotes)
    }

    /// Drop every slot, including the local one
    pub fn clear(&mut self) -> Vec<(ParticipantId, SurfaceHandle)> {
        self.local = None;
        self.reset_to_local()
    }

    /// Current ordered slots
    pub fn snapshot(&self) -> Vec<ViewSlot> {
        let Some(local) = self.local else {
            return Vec::new();
        };

        std::iter::once(ViewSource::Local(local))
            .chain(
                self.remotes
                    .iter()
                    .map(|&(participant, surface)| ViewSource::Remote {
                        participant,
                        surface,
                    }),
            )
            .enumerate()
            .map(|(slot_index, source)| ViewSlot { slot_index, source })
            .collect()
    }

    /// Layout hint for the current slot count
    pub fn layout(&self) -> ViewLayout {
        ViewLayout::for_count(self.len())
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        if self.local.is_some() {
            1 + self.remotes.len()
        } else {
            0
        }
    }

    /// Check if no slot is present
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of remote slots
    pub fn remote_count(&self) -> usize {
        self.remotes.len()
    }

    /// Check if every remote slot is taken
    pub fn is_full(&self) -> bool {
        self.remotes.len() >= self.max_remotes()
    }

    /// Check if a participant has a slot
    pub fn contains(&self, participant: ParticipantId) -> bool {
        self.remotes.iter().any(|(id, _)| *id == participant)
    }
}
