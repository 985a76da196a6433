use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, Utc};

use crate::collector::{TrendingCollection, collect_trending};
use crate::config::{Args, Command, Config, GenerateArgs, UpdateArgs, default_config_dir};
use crate::model::{Snapshot, SnapshotEntry, playlist_url};
use crate::quota::{format_duration, until_reset};
use crate::ranking::{newly_added, rank_by_comments, rank_by_likes, rank_by_points, rank_by_ratio, rank_by_views};
use crate::report::{PageBuilder, ReportData, save_pages};
use crate::sync::{load_targets, persist_retry_state, sync_playlist};
use crate::utils::dump_json;
use crate::youtube::{Auth, Client, ClientSecret, Cost, CredentialStore, Playlist, YoutubeClient};

pub async fn run(args: Args) -> Result<()> {
    let config_dir = match args.config_dir {
        Some(dir) => dir,
        None => default_config_dir()?,
    };
    let config = Config::load(&config_dir)?;
    match args.command {
        Command::Generate(generate) => generate_report(&config, generate).await,
        Command::Update(update) => update_playlist(&config, &config_dir, update).await,
    }
}

/// 上一次发布的快照，既用于计算播放增速，也用于找出新上榜的视频
async fn previous_snapshot(config: &Config, remote: bool, client: &Client) -> Result<Option<Snapshot>> {
    if remote {
        let url = config
            .snapshot_url
            .as_deref()
            .context("--remote-snapshot requires snapshot_url in config")?;
        info!("downloading previous snapshot from {}", url);
        return Snapshot::fetch(client.inner(), url).await.map(Some);
    }
    if !config.public_snapshot_path.exists() {
        info!("no previous snapshot at {}", config.public_snapshot_path.display());
        return Ok(None);
    }
    Snapshot::load(&config.public_snapshot_path)
        .map(Some)
        .context("failed to load previous snapshot")
}

async fn generate_report(config: &Config, args: GenerateArgs) -> Result<()> {
    let youtube = YoutubeClient::new(Auth::ApiKey(args.api_key));
    let collection = if args.cache && config.cache_path.exists() {
        info!("using cached collection {}", config.cache_path.display());
        TrendingCollection::load(&config.cache_path)?
    } else {
        let regions = args.regions.or_else(|| config.regions.clone());
        let collection = collect_trending(&youtube, regions).await?;
        if args.cache {
            collection.save(&config.cache_path)?;
        }
        collection
    };
    // 必须在写入新快照之前读取
    let previous = previous_snapshot(config, args.remote_snapshot, &youtube.client).await?;

    let ranked = rank_by_views(&collection.records, &collection.counts, config.threshold);
    info!(
        "{} of {} videos appeared in at least {} regions",
        ranked.len(),
        collection.records.len(),
        config.threshold
    );
    let points = rank_by_points(
        &collection.records,
        &collection.counts,
        collection.regions.len(),
        config.points_threshold,
    );
    let likes = rank_by_likes(&ranked);
    let comments = rank_by_comments(&ranked);
    let ratio = match previous.as_ref().map(|s| (s, s.taken_at)) {
        Some((snapshot, Some(taken_at))) => {
            let elapsed = (Utc::now() - taken_at).num_milliseconds() as f64 / 1000.0;
            Some((rank_by_ratio(&ranked, &snapshot.view_counts(), elapsed), taken_at))
        }
        Some((_, None)) => {
            warn!("time of the previous snapshot is unknown, skip ratio ranking");
            None
        }
        None => None,
    };
    let newly = previous.as_ref().map(|s| newly_added(&ranked, &s.video_ids()));

    let snapshot = ranked.iter().map(SnapshotEntry::from).collect::<Vec<_>>();
    dump_json(&config.snapshot_path, &snapshot, false)?;
    dump_json(&config.public_snapshot_path, &snapshot, false)?;
    if let Some(newly) = &newly {
        info!("{} videos are newly added", newly.len());
        let entries = newly.iter().map(SnapshotEntry::from).collect::<Vec<_>>();
        dump_json(&config.newly_added_path, &entries, false)?;
    }

    let builder = PageBuilder::new(&config.entry_template, config.template_dir.clone())?;
    let pages = builder.build(&ReportData {
        ranked: &ranked,
        points: &points,
        likes: &likes,
        comments: &comments,
        ratio: ratio.as_ref().map(|(entries, taken_at)| (entries.as_slice(), *taken_at)),
        newly_added: newly.as_deref(),
        top_n: config.top_n,
        playlist_id: &config.playlist_id,
        generated_at: Local::now(),
    })?;
    save_pages(&config.docs_dir, &pages)?;
    info!("{} pages written to {}", pages.len(), config.docs_dir.display());
    info!(
        "total videos = {}, collection cost = {}, adding all of them to the playlist costs up to {}",
        ranked.len(),
        collection.cost,
        ranked.len() as u64 * Cost::Write.units()
    );
    Ok(())
}

async fn update_playlist(config: &Config, config_dir: &Path, args: UpdateArgs) -> Result<()> {
    let secret = ClientSecret::load(&args.client_secret)?;
    let client = Client::new();
    let store = CredentialStore::new(
        client.clone(),
        secret,
        config.token_path(config_dir),
        config.scopes.clone(),
    );
    let credential = store.authorize(args.relogin).await?;
    let youtube = YoutubeClient::with_client(client, Auth::OAuth(credential));
    let playlist = Playlist::new(&youtube, config.playlist_id.as_str());
    let info = store.verify(playlist.get_info()).await?;
    info!("syncing playlist \"{}\" ({})", info.title, info.privacy_status);

    let input = args.input.unwrap_or_else(|| config.snapshot_path.clone());
    let targets = load_targets(&input)?;
    info!("{} videos in {}", targets.len(), input.display());
    let report = sync_playlist(&playlist, &targets, !args.no_clear).await?;
    persist_retry_state(&input, &report)?;

    info!(
        "removed = {}, added = {}, already present = {}",
        report.removed, report.added, report.skipped
    );
    if report.not_added.is_empty() {
        info!("all videos added to playlist");
    } else {
        let (left, reset_at) = until_reset(Utc::now());
        warn!("total {} videos not added, saved to {}", report.not_added.len(), input.display());
        warn!(
            "re-run with --no-clear after {} @ {}, when the quota is renewed",
            format_duration(left),
            reset_at.format("%I:%M %p")
        );
    }
    info!(
        "quota used in this run = {} ({} by playlist changes)",
        youtube.cost(),
        report.cost
    );
    info!("visit here: {}", playlist_url(&config.playlist_id));
    Ok(())
}
