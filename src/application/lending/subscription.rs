use crate::domain::{Ledger, Revision};
use crate::ports::ledger_store;
use futures::stream::{self, BoxStream, StreamExt};

use super::errors::{LendingError, Result};
use super::lending_service::ServiceDependencies;

/// 台帳の変更を購読する
///
/// 最初に現在の台帳を1件、その後コミットごとにスナップショットを配信する。
/// ストリームは購読を保持している間は終了しない。終了するのはドロップされたときか、
/// ストアの回復不能なエラーを1件の`Err`として配信した後のみ。
///
/// 購読者は互いに独立しており、1つをドロップしても他の購読者やストアに影響しない。
pub fn subscribe(deps: &ServiceDependencies) -> BoxStream<'static, Result<Ledger>> {
    tracing::debug!(ledger = %deps.ledger_key, "ledger subscription attached");
    ordered_snapshots(deps.ledger_store.subscribe(&deps.ledger_key))
}

struct OrderedState {
    source: BoxStream<'static, ledger_store::Result<Ledger>>,
    last_delivered: Option<Revision>,
    terminated: bool,
}

/// ストアのストリームにコミット順の保証を重ねる
///
/// 既に配信したリビジョン以前のスナップショットは破棄する（古い状態を後から配信しない）。
/// ストアのエラーは`StoreUnavailable`として1回だけ配信し、ストリームを終了する。
pub(super) fn ordered_snapshots(
    source: BoxStream<'static, ledger_store::Result<Ledger>>,
) -> BoxStream<'static, Result<Ledger>> {
    let state = OrderedState {
        source,
        last_delivered: None,
        terminated: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.terminated {
            return None;
        }

        loop {
            match state.source.next().await {
                None => return None,
                Some(Ok(ledger)) => {
                    if state
                        .last_delivered
                        .is_some_and(|last| ledger.revision() <= last)
                    {
                        tracing::trace!(revision = %ledger.revision(), "discarding stale snapshot");
                        continue;
                    }
                    state.last_delivered = Some(ledger.revision());
                    return Some((Ok(ledger), state));
                }
                Some(Err(e)) => {
                    tracing::error!(error = %e, "ledger subscription failed");
                    state.terminated = true;
                    return Some((Err(LendingError::StoreUnavailable(e)), state));
                }
            }
        }
    })
    .boxed()
}
