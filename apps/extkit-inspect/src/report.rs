//! Text renderings of a [`ConfigurationInfo`].

use std::fmt::Write;

use anyhow::Result;
use extkit::item::simple_name;
use extkit::{ConfigItem, ConfigScope, ConfigurationInfo, ItemId, ItemInfo, OptionInfo};
use extkit_bootstrap::{ReportConfig, ReportFormat};

pub fn render(info: &ConfigurationInfo, report: &ReportConfig) -> Result<String> {
    match report.format {
        ReportFormat::Json => Ok(serde_json::to_string_pretty(info)?),
        ReportFormat::Yaml => Ok(serde_yaml::to_string(info)?),
        ReportFormat::Text => {
            let mut sections = Vec::new();
            if report.tree {
                sections.push(render_tree(info));
            }
            if report.options {
                sections.push(render_options(info));
            }
            if report.summary {
                sections.push(render_summary(info));
            }
            Ok(sections.join("\n"))
        }
    }
}

/* ---------------------------------- tree ---------------------------------- */

enum Node<'a> {
    Item(&'a ItemInfo),
    /// Registration rejected as a duplicate of the item.
    Repeat(&'a ItemInfo),
    Scope(ConfigScope),
}

fn scope_label(scope: ConfigScope) -> &'static str {
    match scope {
        ConfigScope::Application => "<application>",
        ConfigScope::BundleLookup => "<bundle lookup>",
        ConfigScope::ClasspathScan => "<classpath scan>",
        ConfigScope::Hook => "<hooks>",
        ConfigScope::OptionalExtensionDisabler => "<optional extensions>",
    }
}

fn display_id(id: &ItemId) -> &str {
    match ConfigScope::recognize(id) {
        Some(scope) => scope_label(scope),
        None => id.simple_name(),
    }
}

fn owned_by<'a>(info: &'a ConfigurationInfo, scope: &ItemId) -> Vec<Node<'a>> {
    let mut nodes: Vec<Node<'a>> = info
        .items
        .iter()
        .filter(|i| i.registration_scope.as_ref() == Some(scope))
        .map(Node::Item)
        .collect();
    nodes.extend(
        info.items
            .iter()
            .filter(|i| i.also_attempted_by.contains(scope))
            .map(Node::Repeat),
    );
    nodes
}

fn item_label(item: &ItemInfo) -> String {
    let mut label = format!("{:<11} {}", item.kind.label(), item.id.simple_name());
    let mut tags: Vec<String> = Vec::new();
    if let Some(order) = item.init_order {
        tags.push(format!("#{order}"));
    }
    if item.overriding {
        tags.push("override".into());
    }
    if item.optional {
        tags.push("optional".into());
    }
    if item.lazy {
        tags.push("lazy".into());
    }
    if item.phase == Some(extkit::ConfigPhase::Run) {
        tags.push("from run".into());
    }
    if !item.installed_by.is_empty() {
        let installers: Vec<&str> = item.installed_by.iter().map(|i| simple_name(i)).collect();
        tags.push(format!("-> {}", installers.join(", ")));
    } else if item.kind == ConfigItem::Extension && item.is_enabled() {
        tags.push("not recognized".into());
    }
    if !item.is_enabled() {
        let by: Vec<&str> = item.disabled_by.iter().map(display_id).collect();
        tags.push(format!("DISABLED by {}", by.join(", ")));
    }
    if !tags.is_empty() {
        let _ = write!(label, "  [{}]", tags.join("; "));
    }
    label
}

fn node_label(node: &Node<'_>) -> String {
    match node {
        Node::Item(item) => item_label(item),
        Node::Repeat(item) => format!(
            "{:<11} {}  [DUPLICATE, ignored]",
            item.kind.label(),
            item.id.simple_name()
        ),
        Node::Scope(scope) => scope_label(*scope).to_string(),
    }
}

fn write_nodes(out: &mut String, info: &ConfigurationInfo, nodes: Vec<Node<'_>>, prefix: &str) {
    let last = nodes.len().saturating_sub(1);
    for (i, node) in nodes.into_iter().enumerate() {
        let (branch, indent) = if i == last {
            ("└── ", "    ")
        } else {
            ("├── ", "│   ")
        };
        let _ = writeln!(out, "{prefix}{branch}{}", node_label(&node));
        let children = match node {
            Node::Item(item) => owned_by(info, &item.id),
            Node::Scope(scope) => owned_by(info, &scope.id()),
            Node::Repeat(_) => Vec::new(),
        };
        if !children.is_empty() {
            write_nodes(out, info, children, &format!("{prefix}{indent}"));
        }
    }
}

/// Items nested under the scope that registered them.
pub fn render_tree(info: &ConfigurationInfo) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "APPLICATION {}", info.application);

    let mut roots = owned_by(info, &ConfigScope::Application.id());
    for scope in [ConfigScope::BundleLookup, ConfigScope::ClasspathScan, ConfigScope::Hook] {
        if !owned_by(info, &scope.id()).is_empty() {
            roots.push(Node::Scope(scope));
        }
    }
    write_nodes(&mut out, info, roots, "    ");

    let ghosts: Vec<&ItemInfo> = info.items.iter().filter(|i| !i.is_registered()).collect();
    if !ghosts.is_empty() {
        let _ = writeln!(out, "\n    Disabled, never registered:");
        for item in ghosts {
            let _ = writeln!(out, "        {}", item_label(item));
        }
    }
    out
}

/* --------------------------------- options -------------------------------- */

fn option_status(option: &OptionInfo) -> &'static str {
    match (option.set, option.used) {
        (true, true) => "set",
        (true, false) => "set, NOT USED",
        (false, true) => "default",
        (false, false) => "default, not used",
    }
}

/// Every option the run touched, grouped.
pub fn render_options(info: &ConfigurationInfo) -> String {
    let mut out = String::from("OPTIONS\n");
    for group in info.options.groups() {
        let _ = writeln!(out, "    {group}");
        for option in info.options.in_group(group) {
            let _ = writeln!(
                out,
                "        {:<24} {:<28} {:<10} ({})",
                option.option.name(),
                option.value.to_string(),
                option.value_type,
                option_status(option)
            );
        }
    }
    out
}

/* --------------------------------- summary -------------------------------- */

/// Counts per item kind plus anything that looks like a misconfiguration.
pub fn render_summary(info: &ConfigurationInfo) -> String {
    let mut out = String::from("SUMMARY\n");

    let init_order: Vec<&str> = info
        .bundle_init_order
        .iter()
        .map(ItemId::simple_name)
        .collect();
    let _ = writeln!(
        out,
        "    bundles      {} enabled, {} disabled  (init order: {})",
        info.enabled(ConfigItem::Bundle).len(),
        info.disabled(ConfigItem::Bundle).len(),
        init_order.join(" -> ")
    );
    let _ = writeln!(
        out,
        "    host bundles {} enabled",
        info.enabled(ConfigItem::HostBundle).len()
    );

    let modules = info.enabled(ConfigItem::Module);
    let overriding = modules.iter().filter(|m| m.overriding).count();
    let _ = writeln!(
        out,
        "    modules      {} enabled ({overriding} overriding), {} disabled",
        modules.len(),
        info.disabled(ConfigItem::Module).len()
    );

    let _ = writeln!(out, "    installers   {}", info.installers.len());
    for installer in &info.installers {
        let order = installer
            .order
            .map_or_else(|| "-".to_string(), |o| o.to_string());
        let _ = writeln!(
            out,
            "        {:>3}  {:<28} {:<8} {}{}",
            order,
            installer.id.simple_name(),
            format!("{:?}", installer.strategy).to_lowercase(),
            installer.extensions.len(),
            if installer.web { "  web" } else { "" }
        );
    }

    let extensions = info.enabled(ConfigItem::Extension);
    let unrecognized: Vec<&str> = extensions
        .iter()
        .filter(|e| e.installed_by.is_empty())
        .map(|e| e.id.simple_name())
        .collect();
    let _ = writeln!(
        out,
        "    extensions   {} enabled, {} disabled, {} not recognized",
        extensions.len(),
        info.disabled(ConfigItem::Extension).len(),
        unrecognized.len()
    );
    let _ = writeln!(out, "    duplicates   {} ignored", info.ignored.len());

    for warning in warnings(info) {
        let _ = writeln!(out, "    WARNING      {warning}");
    }
    out
}

/// Diagnostics a `check` run fails on.
pub fn warnings(info: &ConfigurationInfo) -> Vec<String> {
    let mut warnings: Vec<String> = info
        .options
        .set_but_unused()
        .map(|o| format!("option {} was set but never read", o.option))
        .collect();
    warnings.extend(
        info.enabled(ConfigItem::Extension)
            .iter()
            .filter(|e| e.installed_by.is_empty())
            .map(|e| format!("extension {} is not recognized by any installer", e.id)),
    );
    if !info.is_balanced() {
        warnings.push(format!(
            "configuration scopes unbalanced: entered {}, exited {}",
            info.scope_stats.entered, info.scope_stats.exited
        ));
    }
    warnings
}
