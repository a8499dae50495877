#[tokio::main]
async fn main() {
    movielist::start_server().await;
}
