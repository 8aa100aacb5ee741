//! inspect command - Summarize snapshots or show one element

use std::path::PathBuf;

use anyhow::{anyhow, Context as _, Result};
use serde_json::json;

use super::{resolve_all, Context};
use crate::core::model::{Element, ElementKind, VersionGraph};
use crate::core::snapshot::load_all;
use crate::core::types::Oid;
use crate::ui::output;

/// Run the inspect command.
pub fn inspect(ctx: &Context, snapshots: &[PathBuf], element: Option<&str>, json: bool) -> Result<()> {
    let paths = resolve_all(ctx, snapshots)?;
    let (graph, merges) = load_all(&paths).context("Failed to load snapshots")?;
    let conflicts: usize = merges.iter().map(|m| m.name_conflicts.len()).sum();

    match element {
        Some(raw) => {
            let oid = Oid::new(raw).with_context(|| format!("Invalid oid '{raw}'"))?;
            let element = graph
                .get(&oid)
                .ok_or_else(|| anyhow!("Element {oid} is not in the loaded snapshots"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&element_json(element))?);
            } else {
                print_element(&graph, element);
            }
        }
        None if json => {
            let value = json!({
                "snapshots": paths,
                "stats": graph.stats(),
                "name_conflicts": conflicts,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        None => {
            let stats = graph.stats();
            output::print(
                output::format_table(
                    &[
                        ("snapshots", paths.len()),
                        ("elements", stats.elements),
                        ("symlinks", stats.symlinks),
                        ("branches", stats.branches),
                        ("versions", stats.versions),
                        ("merge links", stats.merge_links),
                        ("directory entries", stats.directory_entries),
                    ],
                    "",
                ),
                ctx.verbosity,
            );
            if conflicts > 0 {
                output::warn(
                    format!("{conflicts} element(s) had different names across snapshots"),
                    ctx.verbosity,
                );
            }
        }
    }
    Ok(())
}

fn kind_label(kind: &ElementKind) -> String {
    match kind {
        ElementKind::File => "file".to_string(),
        ElementKind::Directory => "directory".to_string(),
        ElementKind::Symlink { target, .. } => format!("symlink -> {target}"),
    }
}

fn print_element(graph: &VersionGraph, element: &Element) {
    println!("{} ({})", element.name(), element.oid());
    println!("kind: {}", kind_label(element.kind()));
    for branch in element.branches() {
        match branch.branching_point() {
            Some(point) => println!("branch {} from {point}", branch.name()),
            None => println!("branch {}", branch.name()),
        }
        for version in branch.versions() {
            println!(
                "  {:>4}  {}  {}  {}",
                version.number(),
                version.date().format("%Y-%m-%d %H:%M:%S"),
                version.author().login,
                version.comment().lines().next().unwrap_or("")
            );
            if !version.labels().is_empty() {
                println!("        labels: {}", version.labels().join(" "));
            }
            for target in version.merges_to() {
                println!("        merged to {target}");
            }
            for source in version.merges_from() {
                println!("        merged from {source}");
            }
            for (entry, child) in version.content().into_iter().flatten() {
                let name = graph.get(child).map_or("?", Element::name);
                println!("        {entry} -> {child} ({name})");
            }
        }
    }
}

fn element_json(element: &Element) -> serde_json::Value {
    let branches: Vec<_> = element
        .branches()
        .map(|branch| {
            let versions: Vec<_> = branch
                .versions()
                .iter()
                .map(|v| {
                    json!({
                        "number": v.number(),
                        "author": v.author().name,
                        "login": v.author().login,
                        "date": v.date(),
                        "comment": v.comment(),
                        "labels": v.labels(),
                        "merges_to": v.merges_to(),
                        "merges_from": v.merges_from(),
                        "content": v.content(),
                    })
                })
                .collect();
            json!({
                "name": branch.name(),
                "branching_point": branch.branching_point(),
                "versions": versions,
            })
        })
        .collect();
    json!({
        "oid": element.oid(),
        "name": element.name(),
        "kind": kind_label(element.kind()),
        "branches": branches,
    })
}
