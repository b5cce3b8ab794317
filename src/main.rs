/*
 * Dext Plugin Runtime
 * Copyright (C) 2025 Akaere Networks
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 */

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use dext_runtime::config::Cli;
use dext_runtime::core::logger::init_from_args;
use dext_runtime::plugins::{init_registry, PluginSummary};
use dext_runtime::{log_debug, log_notice, process_helpers, process_query, DispatchContext};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    init_from_args(args.debug, args.trace, args.journald).context("Failed to initialize logger")?;

    let config = args.runtime_config();
    log_debug!("Runtime configuration: {:?}", config);

    let registry = init_registry(&config).await?;

    if args.list {
        let summaries: Vec<PluginSummary> = registry.plugins().iter().map(|p| p.summary()).collect();
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    // Ctrl-C cancels in-flight plugins instead of leaving children behind
    let cancel = CancellationToken::new();
    let ctx = DispatchContext::from_config(&config).with_cancel(cancel.clone());
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log_notice!("Interrupted, cancelling query");
            cancel.cancel();
        }
    });

    let input = args.query.join(" ");
    let response = if args.helpers {
        process_helpers(&registry, &input, &ctx).await
    } else {
        process_query(&registry, &input, &ctx).await
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
