// SPDX-License-Identifier: GPL-3.0-only

//! Source chooser: disambiguates when more than one source is usable

use crate::backends::{ChooserOutcome, PresentationHost};
use crate::errors::PickError;
use crate::types::{Interruption, MediaSourceKind};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct SourceChooser {
    host: Arc<dyn PresentationHost>,
}

impl SourceChooser {
    pub fn new(host: Arc<dyn PresentationHost>) -> Self {
        Self { host }
    }

    /// Reduce `usable` to a single source
    ///
    /// No UI is shown for zero or one option. With two or more the host
    /// chooser is presented with the options in input order.
    pub async fn choose(&self, usable: &[MediaSourceKind]) -> Result<MediaSourceKind, Interruption> {
        match usable {
            [] => Err(PickError::no_source_available().into()),
            [only] => {
                debug!(kind = %only, "Single usable source, skipping chooser");
                Ok(*only)
            }
            options => match self.host.present_chooser(options).await {
                ChooserOutcome::Chosen(kind) if options.contains(&kind) => {
                    info!(kind = %kind, "Source chosen");
                    Ok(kind)
                }
                ChooserOutcome::Chosen(kind) => {
                    warn!(kind = %kind, "Chooser returned a source that was not offered, treating as cancel");
                    Err(Interruption::Cancelled)
                }
                ChooserOutcome::Cancelled => {
                    info!("Chooser cancelled");
                    Err(Interruption::Cancelled)
                }
            },
        }
    }
}
