use std::sync::Arc;

use clap::Parser;
use log::{error, info, warn};
use server::{AppState, Args, router};
use subtitles::{
    SubtitleResolver,
    http::{HttpFetcher, ReqwestFetcher},
    metadata::CinemetaClient,
    render::{DisabledRenderer, PageRenderer, RemoteRenderer},
};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    env_logger::init();
    let args = Args::parse();

    let fetcher: Arc<dyn HttpFetcher> = match ReqwestFetcher::new(args.request_timeout()) {
        Ok(fetcher) => Arc::new(fetcher),
        Err(err) => {
            error!("Couldn't build the http client: {err}");
            return;
        }
    };

    let renderer: Arc<dyn PageRenderer> = match &args.render_endpoint {
        Some(endpoint) => {
            info!("Rendering pages with {endpoint}");
            Arc::new(RemoteRenderer::new(endpoint.clone(), args.render_timeout()))
        }
        None => {
            warn!("No render endpoint configured, dynamic pages are read as static html");
            Arc::new(DisabledRenderer)
        }
    };

    let metadata = Arc::new(CinemetaClient::new(
        fetcher.clone(),
        args.metadata_base.clone(),
    ));

    let provider = SubtitleResolver::new(args.resolver_config(), fetcher, renderer, metadata);
    let state = AppState {
        provider: Arc::new(provider),
        public_origin: args.public_origin().into(),
        direct_links: args.direct_links,
    };

    let address = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&address)
        .await
        .expect("Server can't be started");

    info!("Serving subtitles on {address}");
    info!("Manifest at {}/manifest.json", args.public_origin());

    axum::serve(listener, router(state))
        .await
        .expect("Server stopped unexpectedly");
}
