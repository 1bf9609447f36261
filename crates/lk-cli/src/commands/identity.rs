//! Identity command - canonical game ids and provider mappings

use anyhow::{Context, Result};
use chrono::Utc;
use lk_core::{CanonicalGameId, GameIdentity, Provider};
use lk_meta::identity::{
    add_mapping, list_identities, register_identity, resolve, review_identities, verify,
};
use std::collections::BTreeMap;

use crate::cli::{
    GlobalArgs, IdentityArgs, IdentityCommands, IdentityListArgs, IdentityMapArgs,
    IdentityRegisterArgs, IdentityResolveArgs, IdentityReviewArgs, IdentityVerifyArgs,
};
use crate::commands::common::{format_ts, print_json, print_table, ExitCode};
use crate::context::RuntimeContext;

/// Execute the identity command
pub(crate) async fn execute(args: &IdentityArgs, global: &GlobalArgs) -> Result<()> {
    match &args.command {
        IdentityCommands::Register(register) => execute_register(register, global),
        IdentityCommands::Map(map) => execute_map(map, global),
        IdentityCommands::Resolve(res) => execute_resolve(res, global),
        IdentityCommands::Verify(ver) => execute_verify(ver, global),
        IdentityCommands::Review(review) => execute_review(review, global),
        IdentityCommands::List(list) => execute_list(list, global),
    }
}

/// Parse repeated `PROVIDER=EXTERNAL_ID` arguments. A provider may appear
/// only once.
pub(crate) fn parse_provider_ids(pairs: &[String]) -> Result<BTreeMap<Provider, String>> {
    let mut ids = BTreeMap::new();
    for pair in pairs {
        let Some((provider, external_id)) = pair.split_once('=') else {
            anyhow::bail!("Invalid --provider '{pair}': expected PROVIDER=EXTERNAL_ID");
        };
        let provider = Provider::parse(provider.trim())
            .with_context(|| format!("Invalid --provider '{pair}'"))?;
        if ids.insert(provider, external_id.to_string()).is_some() {
            anyhow::bail!("Provider {provider} given more than once");
        }
    }
    Ok(ids)
}

fn execute_register(args: &IdentityRegisterArgs, global: &GlobalArgs) -> Result<()> {
    let canonical = CanonicalGameId::parse(&args.canonical)?;
    let ids = parse_provider_ids(&args.providers)?;
    let now = Utc::now();
    let identity = GameIdentity::new(canonical, ids, args.confidence, args.primary, now)?;

    let ctx = RuntimeContext::new(global)?;
    register_identity(&ctx.db, &identity, now)
        .with_context(|| format!("Failed to register {}", identity.canonical_id))?;
    println!(
        "Registered {} with {} provider ids (primary {})",
        identity.canonical_id,
        identity.external_ids.len(),
        identity.primary_source
    );
    Ok(())
}

fn execute_map(args: &IdentityMapArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let added = add_mapping(
        &ctx.db,
        &args.canonical,
        args.provider,
        &args.external_id,
        Utc::now(),
    )
    .with_context(|| format!("Failed to map {} id for {}", args.provider, args.canonical))?;
    if added {
        println!(
            "Mapped {} {} to {}",
            args.provider,
            args.external_id.trim(),
            args.canonical
        );
    } else {
        println!("Mapping already present");
    }
    Ok(())
}

fn execute_resolve(args: &IdentityResolveArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    match resolve(ctx.db.conn(), args.provider, &args.external_id)
        .context("Failed to resolve provider id")?
    {
        Some(canonical) => {
            println!("{canonical}");
            Ok(())
        }
        None => {
            eprintln!("No game mapped for {} id '{}'", args.provider, args.external_id);
            Err(ExitCode(1).into())
        }
    }
}

fn execute_verify(args: &IdentityVerifyArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let identity = verify(&ctx.db, &args.canonical, args.confidence, Utc::now())
        .with_context(|| format!("Failed to verify {}", args.canonical))?;
    println!(
        "Verified {} at confidence {:.2}",
        identity.canonical_id, identity.resolution_confidence
    );
    Ok(())
}

fn execute_review(args: &IdentityReviewArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let review = review_identities(ctx.db.conn(), Utc::now(), &ctx.config.identity)
        .context("Failed to review identities")?;
    if args.json {
        return print_json(&review);
    }
    if review.is_empty() {
        println!("No identities need review.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = review
        .iter()
        .map(|r| {
            let mut reasons = Vec::new();
            if r.flags.needs_reverification {
                reasons.push("low confidence");
            }
            if r.flags.stale {
                reasons.push("stale");
            }
            vec![
                r.identity.canonical_id.to_string(),
                format!("{:.2}", r.identity.resolution_confidence),
                format_ts(&r.identity.last_verified_at),
                reasons.join(", "),
            ]
        })
        .collect();
    print_table(&["GAME", "CONFIDENCE", "VERIFIED", "REASON"], &rows);
    Ok(())
}

fn execute_list(args: &IdentityListArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let identities = list_identities(ctx.db.conn()).context("Failed to list identities")?;
    if args.json {
        return print_json(&identities);
    }

    let rows: Vec<Vec<String>> = identities
        .iter()
        .map(|i| {
            let ids: Vec<String> = i
                .external_ids
                .iter()
                .map(|(p, id)| format!("{p}={id}"))
                .collect();
            vec![
                i.canonical_id.to_string(),
                i.primary_source.to_string(),
                format!("{:.2}", i.resolution_confidence),
                ids.join(" "),
            ]
        })
        .collect();
    print_table(&["GAME", "PRIMARY", "CONFIDENCE", "PROVIDER_IDS"], &rows);
    Ok(())
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;
