#[tokio::main]
async fn main() {
    strawpoll::start_server().await;
}
