//! One-shot device identity read.

use tracing::{debug, warn};
use uuid::Uuid;

use inkbird_types::DeviceIdentity;
use inkbird_types::uuids::{FIRMWARE_REVISION, MODEL};

use crate::error::Result;
use crate::transport::Transport;

/// Connect, read the model and firmware characteristics and disconnect.
///
/// The link is torn down even when a read fails. A characteristic that
/// cannot be read yields an empty string rather than an error; only a
/// failed connect is returned.
///
/// Do not call this on a transport a [`Supervisor`](crate::Supervisor)
/// currently owns.
#[tracing::instrument(level = "info", skip_all, fields(address = %transport.address()))]
pub async fn read_identity<T: Transport + ?Sized>(transport: &T) -> Result<DeviceIdentity> {
    transport.connect().await?;

    let mut identity = DeviceIdentity::new(transport.address());
    identity.firmware = read_string(transport, FIRMWARE_REVISION).await;
    identity.model = read_string(transport, MODEL).await;

    if let Err(e) = transport.disconnect().await {
        warn!(error = %e, "Failed to disconnect after identity read");
    }

    debug!(?identity, "Retrieved device identity");
    Ok(identity)
}

async fn read_string<T: Transport + ?Sized>(transport: &T, uuid: Uuid) -> String {
    match transport.read_characteristic(uuid).await {
        Ok(data) => decode_string(&data),
        Err(e) => {
            debug!(%uuid, error = %e, "Failed to read characteristic");
            String::new()
        }
    }
}

/// Device strings are NUL padded and not guaranteed to be valid UTF-8.
fn decode_string(data: &[u8]) -> String {
    String::from_utf8_lossy(data)
        .trim_end_matches('\0')
        .trim()
        .to_string()
}
