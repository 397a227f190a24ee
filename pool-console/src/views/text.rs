// SPDX-License-Identifier: GPL-3.0-only

//! Plain-text rendering of the Storage page for the terminal

use std::fmt::Write;

use pool_types::{PoolProperties, TopologyGroup, bytes_to_pretty};

use crate::fl;
use crate::views::widgets::{PoolWidget, StoragePage, VdevWidget};

fn group_label(group: TopologyGroup) -> String {
    match group {
        TopologyGroup::Data => fl!("group-data"),
        TopologyGroup::Logs => fl!("group-logs"),
        TopologyGroup::Cache => fl!("group-cache"),
        TopologyGroup::Spare => fl!("group-spare"),
    }
}

fn vdev_line(vdev: &VdevWidget) -> String {
    let disks = vdev
        .disks
        .iter()
        .map(|disk| disk.rsplit('/').next().unwrap_or(disk))
        .collect::<Vec<_>>()
        .join(", ");

    match &vdev.status {
        Some(status) => format!("{} [{disks}] {status}", vdev.vdev_type),
        None => format!("{} [{disks}]", vdev.vdev_type),
    }
}

fn write_pool(out: &mut String, pool: &PoolWidget, show_datasets: bool) {
    let name = if pool.name.is_empty() {
        fl!("unnamed-pool")
    } else {
        pool.name.clone()
    };

    match (&pool.status, pool.exists_on_server) {
        (Some(status), _) => {
            let _ = writeln!(out, "[{}] {name} ({status})", pool.key);
        }
        (None, true) => {
            let _ = writeln!(out, "[{}] {name}", pool.key);
        }
        (None, false) => {
            let _ = writeln!(out, "[{}] {name} ({})", pool.key, fl!("unsaved-pool"));
        }
    }

    if pool.exists_on_server {
        let properties = PoolProperties {
            free: pool.free,
            allocated: pool.allocated,
            size: pool.size,
        };
        let usage = fl!(
            "pool-usage",
            allocated = bytes_to_pretty(pool.allocated, false),
            size = bytes_to_pretty(pool.size, false),
            free = bytes_to_pretty(pool.free, false),
            percent = properties.percent_used()
        );
        let _ = writeln!(out, "    {usage}");
    }

    for (group, vdevs) in pool.topology.groups() {
        if vdevs.is_empty() && group != TopologyGroup::Data {
            continue;
        }
        let label = group_label(group);
        if vdevs.is_empty() {
            let _ = writeln!(out, "    {label}: {}", fl!("empty-group"));
            continue;
        }
        for vdev in vdevs {
            let _ = writeln!(out, "    {label}: {}", vdev_line(vdev));
        }
    }

    if pool.exists_on_server {
        let _ = writeln!(out, "    {}", fl!("dataset-count", count = pool.datasets.len()));
        if show_datasets {
            for dataset in &pool.datasets {
                let label = dataset
                    .get("name")
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| dataset.to_string());
                let _ = writeln!(out, "      - {label}");
            }
        }
    }
}

/// Render `page` as indented text, one block per pool
pub fn format_page(page: &StoragePage, show_datasets: bool) -> String {
    let mut out = String::new();

    for banner in &page.banners {
        let _ = writeln!(out, "! {banner}");
    }
    if let Some(status) = &page.status {
        let _ = writeln!(out, "{status}");
    }

    for pool in &page.pools {
        write_pool(&mut out, pool, show_datasets);
    }

    if let Some(placeholder) = &page.placeholder {
        let available = &placeholder.available_disks;
        if available.is_empty() {
            let _ = writeln!(out, "{}", fl!("no-available-disks"));
        } else {
            let disks = available
                .iter()
                .map(|disk| disk.device_name())
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(out, "{}", fl!("available-disks", disks = disks));
        }
        let _ = writeln!(out, "[{}] + {}", placeholder.key, placeholder.prompt);
    }

    out
}

#[cfg(test)]
mod tests {
    use pool_types::{DiskId, Topology, VdevType};

    use super::*;
    use crate::views::widgets::NewPoolPlaceholder;

    fn pool(name: &str) -> PoolWidget {
        PoolWidget {
            key: 1,
            name: name.to_string(),
            exists_on_server: true,
            draft_index: None,
            topology: Topology {
                data: vec![VdevWidget {
                    vdev_type: VdevType::Mirror.into(),
                    disks: vec!["/dev/ada0".to_string(), "/dev/ada1".to_string()],
                    status: Some("ONLINE".to_string()),
                }],
                ..Topology::default()
            },
            free: 1024,
            allocated: 3072,
            size: 4096,
            datasets: vec![serde_json::json!({ "name": "tank/home" })],
            status: Some("ONLINE".to_string()),
            available_disks: vec![DiskId::from("/dev/ada2")],
        }
    }

    #[test]
    fn loading_page_is_just_the_status() {
        let page = StoragePage {
            status: Some("Looking for ZFS pools...".to_string()),
            ..StoragePage::default()
        };
        assert_eq!(format_page(&page, false), "Looking for ZFS pools...\n");
    }

    #[test]
    fn pool_block_lists_vdevs_and_placeholder() {
        let page = StoragePage {
            pools: vec![pool("tank")],
            placeholder: Some(NewPoolPlaceholder {
                key: 0,
                prompt: "Create a new ZFS pool".to_string(),
                first_pool: false,
                available_disks: vec![DiskId::from("/dev/ada2")],
            }),
            ..StoragePage::default()
        };

        let text = format_page(&page, true);
        assert!(text.starts_with("[1] tank (ONLINE)\n"));
        assert!(text.contains("mirror [ada0, ada1] ONLINE"));
        assert!(text.contains("tank/home"));
        assert!(text.contains("ada2"));
        assert!(text.ends_with("[0] + Create a new ZFS pool\n"));
    }

    #[test]
    fn datasets_are_listed_only_on_request() {
        let page = StoragePage {
            pools: vec![pool("tank")],
            ..StoragePage::default()
        };
        assert!(!format_page(&page, false).contains("tank/home"));
    }
}
