use std::future::Future;

#[cfg(not(target_arch = "wasm32"))]
use maybe_sync::MaybeSend;

use crate::error::MeridianError;

/// Spawns the future on the current tokio runtime.
///
/// Fails if the calling thread does not run inside a runtime. The future is dropped in this case.
#[cfg(not(target_arch = "wasm32"))]
pub fn spawn<T>(future: T) -> Result<(), MeridianError>
where
    T: Future + MaybeSend + 'static,
    T::Output: MaybeSend + 'static,
{
    let handle = tokio::runtime::Handle::try_current()
        .map_err(|err| MeridianError::AsyncSettlement(err.to_string()))?;
    handle.spawn(future);

    Ok(())
}

#[cfg(target_arch = "wasm32")]
pub fn spawn<T>(future: T) -> Result<(), MeridianError>
where
    T: Future + 'static,
    T::Output: 'static,
{
    wasm_bindgen_futures::spawn_local(async {
        future.await;
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_without_runtime_fails() {
        let result = spawn(async {});
        assert!(matches!(result, Err(MeridianError::AsyncSettlement(_))));
    }

    #[test]
    fn spawn_inside_runtime() {
        tokio_test::block_on(async {
            assert!(spawn(async {}).is_ok());
        });
    }
}
