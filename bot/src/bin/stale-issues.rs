use shared::ItemKind;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stalebot::run(ItemKind::Issue).await
}
