//! Site descriptor resolution.

use crate::error::{SdwanError, SdwanResult};
use sdwan_types::ConnectPoint;

/// A tunnel endpoint: the device and port where customer traffic enters or
/// leaves the provider network.
pub type Site = ConnectPoint;

/// Resolves a `"<deviceId>/<port>"` descriptor into a [`Site`].
///
/// Pure parsing, no topology lookup: a well-formed descriptor naming an
/// unknown device still resolves.
pub fn resolve(descriptor: &str) -> SdwanResult<Site> {
    descriptor
        .parse::<ConnectPoint>()
        .map_err(|_| SdwanError::malformed_site(descriptor))
}
