//! Subcommands and their execution against a session

use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Subcommand;
use skillconnect_sdk::format::truncate;
use skillconnect_sdk::media::MediaFile;
use skillconnect_sdk::model::{LearningStatus, UpdateFilter};
use skillconnect_sdk::{Outcome, Session};
use tokio::sync::broadcast::error::RecvError;
use tracing::info;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the feed
    Feed {
        /// Number of posts to show
        #[arg(short, long, default_value = "20")]
        count: usize,
    },

    /// Like or unlike a post
    Like { post_id: i64 },

    /// Comment on a post
    Comment { post_id: i64, text: String },

    /// Publish a post with up to three images or videos
    Post {
        /// Post text
        #[arg(short, long, default_value = "")]
        description: String,
        /// Media files to attach
        files: Vec<PathBuf>,
    },

    /// List learning plans with their progress
    Plans,

    /// Toggle completion of a plan item
    PlanToggle { plan_id: i64, item_id: i64 },

    /// Change the status of a learning update
    UpdateStatus {
        update_id: i64,
        /// Not Started, In Progress, Ongoing, Almost Complete or Completed
        #[arg(value_parser = parse_status)]
        status: LearningStatus,
    },

    /// Follow or unfollow a user
    Follow { user_id: i64 },

    /// Find users by name
    Search { query: String },

    /// Show notifications
    Notifications {
        /// Mark every notification read
        #[arg(long)]
        mark_all_read: bool,
    },

    /// Show the current broadcast banner
    Banner {
        /// Hide it until a newer message arrives
        #[arg(long)]
        dismiss: bool,
    },

    /// Poll for notifications and broadcasts, printing notices as they arrive
    Watch {
        /// Stop after this many seconds
        #[arg(long)]
        secs: Option<u64>,
    },
}

fn parse_status(raw: &str) -> Result<LearningStatus, String> {
    LearningStatus::parse(raw).ok_or_else(|| format!("unknown status '{}'", raw))
}

fn describe<T>(outcome: &Outcome<T>) -> String {
    match outcome {
        Outcome::Confirmed(_) => "saved".to_string(),
        Outcome::Superseded => "superseded by a newer change".to_string(),
        Outcome::Reverted(e) => format!("reverted: {}", e),
        Outcome::Resynced(e) => format!("failed, reloaded from server: {}", e),
    }
}

pub async fn execute(session: &Session, command: Command) -> anyhow::Result<String> {
    let mut out = String::new();

    match command {
        Command::Feed { count } => {
            let total = session.feed().load().await?;
            for post in session.feed().posts().await.into_iter().take(count) {
                let media = post.media().len();
                writeln!(
                    out,
                    "#{} {}: {}{}",
                    post.post_id(),
                    post.author_name(),
                    truncate(post.body(), 80),
                    if media > 0 { format!(" [{} media]", media) } else { String::new() }
                )?;
            }
            write!(out, "{} posts", total)?;
        }

        Command::Like { post_id } => {
            let engagement = session.engagement();
            engagement.load_post(post_id).await?;
            let outcome = engagement.toggle_like(post_id).await?;
            let now = engagement
                .engagement(post_id)
                .await
                .context("post disappeared after loading")?;
            write!(
                out,
                "{} ({} likes, liked: {})",
                describe(&outcome),
                now.like_count(),
                now.is_liked_by(session.user_id())
            )?;
        }

        Command::Comment { post_id, text } => {
            let engagement = session.engagement();
            engagement.load_post(post_id).await?;
            let outcome = engagement.add_comment(post_id, &text).await?;
            match &outcome {
                Outcome::Confirmed(comment) => write!(out, "comment #{} saved", comment.comment_id)?,
                other => write!(out, "{}", describe(other))?,
            }
        }

        Command::Post { description, files } => {
            let mut media = Vec::with_capacity(files.len());
            for path in &files {
                let file = MediaFile::read(path)
                    .await
                    .with_context(|| format!("reading {}", path.display()))?;
                media.push(file);
            }

            let composer = session.composer();
            let selection = composer.select(media).await?;
            for rejected in &selection.rejected {
                writeln!(out, "skipped: {}", rejected)?;
            }

            let slots = composer.upload_all().await?;
            let outcome = session.feed().create_post(&description, slots).await?;
            composer.close();

            match &outcome {
                Outcome::Confirmed(post) => write!(out, "post #{} published", post.post_id())?,
                other => write!(out, "{}", describe(other))?,
            }
        }

        Command::Plans => {
            session.plans().load().await?;
            for plan in session.plans().plans().await {
                writeln!(out, "#{} {} ({}%)", plan.plan_id, plan.title, plan.progress())?;
                for item in &plan.items {
                    let mark = if item.complete { "x" } else { " " };
                    writeln!(out, "  [{}] #{} {}", mark, item.item_id, item.title)?;
                }
            }
        }

        Command::PlanToggle { plan_id, item_id } => {
            let plans = session.plans();
            plans.load().await?;
            let outcome = plans.toggle_item(plan_id, item_id).await?;
            let progress = plans.progress(plan_id).await.unwrap_or(0);
            write!(out, "{} (progress {}%)", describe(&outcome), progress)?;
        }

        Command::UpdateStatus { update_id, status } => {
            let updates = session.updates();
            updates.load(UpdateFilter::default()).await?;
            let outcome = updates.change_status(update_id, status).await?;
            write!(
                out,
                "{} (overall progress {}%)",
                describe(&outcome),
                updates.overall_progress().await
            )?;
        }

        Command::Follow { user_id } => {
            let follows = session.follows();
            follows.load_profile(user_id).await?;
            let outcome = follows.toggle_follow(user_id).await?;
            let status = follows
                .status(user_id)
                .await
                .context("profile disappeared after loading")?;
            write!(
                out,
                "{} (following: {}, followers: {})",
                describe(&outcome),
                status.following,
                status.follower_count()
            )?;
        }

        Command::Search { query } => {
            let search = session.user_search();
            let mut results = search.subscribe();
            search.push(query);
            tokio::time::timeout(session.config().api.request_timeout() * 2, results.changed())
                .await
                .context("search timed out")??;

            let found = search.results();
            for user in &found.users {
                writeln!(out, "#{} {}", user.user_id, user.display_name())?;
            }
            write!(out, "{} users match '{}'", found.users.len(), found.query)?;
        }

        Command::Notifications { mark_all_read } => {
            let notifications = session.notifications();
            notifications.refresh().await?;
            if mark_all_read {
                let outcome = notifications.mark_all_read().await?;
                writeln!(out, "mark all read: {}", describe(&outcome))?;
            }
            for n in notifications.notifications().await {
                let mark = if n.is_read { " " } else { "*" };
                writeln!(out, "{} #{} {}", mark, n.notification_id, n.content)?;
            }
            write!(out, "{} unread", notifications.unread_count().await)?;
        }

        Command::Banner { dismiss } => {
            let banner = session.banner();
            match banner.refresh().await? {
                Some(message) => {
                    write!(out, "{}\n{}", message.title, message.content)?;
                    if dismiss {
                        banner.dismiss()?;
                        write!(out, "\n(dismissed)")?;
                    }
                }
                None => write!(out, "no banner")?,
            }
        }

        Command::Watch { secs } => watch(session, secs.map(Duration::from_secs)).await?,
    }

    Ok(out)
}

async fn watch(session: &Session, limit: Option<Duration>) -> anyhow::Result<()> {
    let mut notices = session.notifier().subscribe();
    let pollers = session.start_polling();
    info!(pollers = pollers.len(), "Watching; press Ctrl-C to stop");

    let deadline = async {
        match limit {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = &mut deadline => break,
            received = notices.recv() => match received {
                Ok(notice) => eprintln!("[{:?}] {}", notice.level, notice.message),
                Err(RecvError::Lagged(skipped)) => eprintln!("({} notices skipped)", skipped),
                Err(RecvError::Closed) => break,
            },
        }
    }

    session.shutdown();
    for poller in pollers {
        poller.stop().await;
    }
    Ok(())
}
