//! Board command handlers

use crate::board_view::TaskFilter;
use crate::cache::{CacheEventKind, QueryKey};
use crate::cli::{render, AppContext};
use crate::models::BoardInput;
use crate::shutdown::ShutdownCoordinator;
use anyhow::{anyhow, Result};
use chrono::Local;
use colored::Colorize;
use tracing::debug;

/// Handle board command: print the three columns once
pub async fn handle_show(ctx: &AppContext, filter: TaskFilter) -> Result<()> {
    let mut controller = ctx.controller();
    controller.set_filter(filter);
    controller.load().await?;

    let today = Local::now().date_naive();
    render::print_board(&controller.view_at(today), controller.filter(), today);
    Ok(())
}

/// Handle watch command: re-render on every change until interrupted
pub async fn handle_watch(ctx: &AppContext, filter: TaskFilter) -> Result<()> {
    let mut controller = ctx.controller();
    controller.set_filter(filter);

    let shutdown = ShutdownCoordinator::new().with_cache(ctx.cache.clone());
    let signals = shutdown.install_signal_handlers();

    let mut subscription = controller.subscribe();
    controller.load().await?;
    let polling = ctx
        .cache
        .spawn_polling(QueryKey::Tasks, ctx.cache.config().refetch_interval);

    let today = Local::now().date_naive();
    render::print_board(&controller.view_at(today), controller.filter(), today);
    println!("\n{}", "Watching for changes, Ctrl-C to stop".dimmed());

    loop {
        tokio::select! {
            _ = shutdown.wait_for_shutdown() => break,
            event = subscription.changed() => match event {
                Some(event) if event.kind == CacheEventKind::Written => {
                    debug!(key = %event.key, "Board changed, re-rendering");
                    let today = Local::now().date_naive();
                    println!("\n{}", format!("Updated {}", Local::now().format("%H:%M:%S")).dimmed());
                    render::print_board(&controller.view_at(today), controller.filter(), today);
                }
                Some(_) => {}
                None => break,
            },
        }
    }

    if let Some(polling) = polling {
        polling.abort();
    }
    signals.abort();
    println!("{}", "Stopped watching".dimmed());
    Ok(())
}

/// Handle board-list command
pub async fn handle_list(ctx: &AppContext) -> Result<()> {
    let value = ctx.cache.fetch(QueryKey::Boards).await?;
    let boards = value
        .as_boards()
        .ok_or_else(|| anyhow!("Unexpected cache value for boards"))?;
    render::print_boards(boards);
    Ok(())
}

/// Handle board-create command
pub async fn handle_create(ctx: &AppContext, name: String) -> Result<()> {
    let board = ctx
        .coordinator
        .create_board(BoardInput::new(name))
        .await
        .map_err(|e| anyhow!(e.user_message()))?;

    render::success("Board created successfully");
    println!("  ID: {}", board.id);
    println!("  Name: {}", board.name);
    Ok(())
}

/// Handle board-rename command
pub async fn handle_rename(ctx: &AppContext, id: i64, name: String) -> Result<()> {
    let board = ctx
        .coordinator
        .update_board(id, BoardInput::new(name))
        .await
        .map_err(|e| anyhow!(e.user_message()))?;

    render::success("Board updated successfully");
    println!("  Name: {}", board.name);
    Ok(())
}

/// Handle board-delete command
pub async fn handle_delete(ctx: &AppContext, id: i64) -> Result<()> {
    ctx.coordinator
        .delete_board(id)
        .await
        .map_err(|e| anyhow!(e.user_message()))?;

    render::success("Board deleted successfully");
    println!("  {}", "All tasks on the board were deleted with it".dimmed());
    Ok(())
}
