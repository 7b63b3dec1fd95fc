use crate::domain::{Ledger, LedgerKey, LedgerTransition, OperationId, Revision};
use async_trait::async_trait;
use futures::stream::BoxStream;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 条件付き書き込みの結果
///
/// リビジョンの競合はエラーではなく結果として返す。
/// ネットワーク障害などのストア障害は`Err`で返す。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// 書き込みが確定した。確定後の台帳を返す
    Committed(Ledger),
    /// 期待したリビジョンが古かった。ストア上の現在のリビジョンを返す
    Conflict { current: Revision },
}

/// 台帳ストアポート
///
/// 台帳レコードの永続化を抽象化する。コーディネーターはこの契約に対してのみ書かれ、
/// 具体的なストレージ技術には依存しない。
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// 台帳を読み込む
    ///
    /// レコードが存在しない場合は空の台帳を作成して返す（冪等な read-or-create）。
    async fn load_or_init(&self, key: &LedgerKey) -> Result<Ledger>;

    /// 条件付き更新
    ///
    /// ストア上のリビジョンが`transition.expected`と等しい場合に限り
    /// `transition.next`を書き込み、コミット記録（`transition.event`）を同時に保存する。
    /// 書き込みは全か無か。
    async fn compare_and_swap(
        &self,
        key: &LedgerKey,
        transition: &LedgerTransition,
    ) -> Result<WriteOutcome>;

    /// 操作IDのコミット記録を探す
    ///
    /// 書き込みの応答が失われた場合に、その操作が確定していたかを判定するために使う。
    /// 確定していればそのリビジョンを返す。
    async fn find_commit(
        &self,
        key: &LedgerKey,
        operation_id: OperationId,
    ) -> Result<Option<Revision>>;

    /// 台帳の変更を購読する
    ///
    /// 最初に現在の状態を1件、その後コミットごとにスナップショットを配信する。
    /// 購読者ごとに独立したストリームで、ドロップすると購読を解除する。
    /// 急速な更新はまとめてよいが、コミット順を崩してはならない。
    fn subscribe(&self, key: &LedgerKey) -> BoxStream<'static, Result<Ledger>>;
}
