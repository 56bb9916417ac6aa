//! Installer pipeline.
//!
//! Pass 1 ([`InstallerPipeline::build`]) orders the enabled installers.
//! Pass 2 matches every candidate type against them in that order: binding
//! happens before the injector exists ([`InstallerPipeline::bind_extensions`]),
//! installation right after it was created ([`InstallerPipeline::install`]).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexSet;
use serde::Serialize;

use crate::context::{ConfigurationContext, Disable, Registrable};
use crate::contracts::{
    Binder, BindingScope, Injector, InstallerHandle, InstallerStrategy, SharedInstance,
};
use crate::error::ExtkitError;
use crate::item::{ConfigItem, ConfigPhase, ConfigScope, ItemId};
use crate::types::TypeDescriptor;

/// An enabled installer with the extensions it recognized.
pub struct InstallerDescriptor {
    id: ItemId,
    handle: InstallerHandle,
    extensions: Vec<TypeDescriptor>,
}

impl InstallerDescriptor {
    pub fn id(&self) -> &ItemId {
        &self.id
    }

    pub fn extensions(&self) -> &[TypeDescriptor] {
        &self.extensions
    }

    pub fn info(&self) -> InstallerInfo {
        InstallerInfo {
            id: self.id.clone(),
            order: self.handle.order(),
            strategy: self.handle.strategy(),
            web: self.handle.is_web(),
            recognizable_signs: self.handle.recognizable_signs(),
            extensions: self.extensions.iter().map(|e| e.name().to_string()).collect(),
        }
    }
}

/// Report view of one pipeline installer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallerInfo {
    pub id: ItemId,
    pub order: Option<i32>,
    pub strategy: InstallerStrategy,
    pub web: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recognizable_signs: Vec<String>,
    /// Recognized extensions, in installation order.
    pub extensions: Vec<String>,
}

pub struct InstallerPipeline {
    installers: Vec<InstallerDescriptor>,
    installed: usize,
}

impl InstallerPipeline {
    /// Pass 1: collects the registered installers, drops disabled ones and
    /// sorts the rest by rank. Unranked installers go last; ties keep
    /// registration order.
    pub fn build(ctx: &mut ConfigurationContext) -> Result<Self, ExtkitError> {
        let mut installers: Vec<InstallerDescriptor> = ctx
            .take_installers()
            .into_iter()
            .filter(|(id, _)| {
                let disabled = ctx.is_disabled(ConfigItem::Installer, id);
                if disabled {
                    tracing::debug!(installer = %id, "Installer disabled");
                }
                !disabled
            })
            .map(|(id, handle)| InstallerDescriptor {
                id,
                handle,
                extensions: Vec::new(),
            })
            .collect();

        if installers.is_empty() {
            return Err(ExtkitError::NoInstallersConfigured);
        }

        installers.sort_by_key(|i| {
            let order = i.handle.order();
            (order.is_none(), order.unwrap_or_default())
        });

        tracing::info!(
            installers = ?installers.iter().map(|i| i.id.simple_name()).collect::<Vec<_>>(),
            "Installers resolved"
        );
        Ok(Self {
            installers,
            installed: 0,
        })
    }

    pub fn installers(&self) -> &[InstallerDescriptor] {
        &self.installers
    }

    pub fn installer_names(&self) -> Vec<String> {
        self.installers
            .iter()
            .map(|i| i.id.type_name().to_string())
            .collect()
    }

    /// Pass 2, binding half. Manual extensions come first, then scanned
    /// candidates. A recognized scanned candidate is registered under the
    /// classpath scan scope before disables apply; a candidate already
    /// registered manually only gains the scan as an additional owner.
    /// Every match is recorded on the extension info; extensions nobody
    /// recognized stay inert, except optional ones which get disabled.
    pub fn bind_extensions(
        &mut self,
        ctx: &mut ConfigurationContext,
        scanned: &[TypeDescriptor],
        binder: &mut dyn Binder,
    ) -> Result<Vec<String>, ExtkitError> {
        let mut candidates = ctx.extensions();
        let mut seen: IndexSet<String> = candidates.iter().map(|ty| ty.name().to_string()).collect();
        let mut scan_seen: HashSet<&str> = HashSet::new();
        for ty in scanned {
            if !scan_seen.insert(ty.name()) || !self.recognizes(ty) {
                continue;
            }
            ctx.with_scope(ConfigScope::ClasspathScan.id(), |ctx| {
                ctx.register_item(Registrable::Extension(ty.clone()))
            })?;
            if seen.insert(ty.name().to_string()) {
                candidates.push(ty.clone());
            }
        }

        let mut recognized = Vec::new();
        for ty in candidates {
            let id = ItemId::of_type(ty.name().to_string());
            if ctx.is_disabled(ConfigItem::Extension, &id) {
                tracing::debug!(extension = %id, "Extension disabled");
                continue;
            }

            let matched: Vec<usize> = self
                .installers
                .iter()
                .enumerate()
                .filter(|(_, installer)| installer.handle.matches(&ty))
                .map(|(index, _)| index)
                .collect();

            if matched.is_empty() {
                self.unrecognized(ctx, &id)?;
                continue;
            }

            self.bind_extension(ctx, &id, &ty, &matched, binder)?;
            recognized.push(ty.name().to_string());
        }
        Ok(recognized)
    }

    fn recognizes(&self, ty: &TypeDescriptor) -> bool {
        self.installers.iter().any(|i| i.handle.matches(ty))
    }

    fn bind_extension(
        &mut self,
        ctx: &mut ConfigurationContext,
        id: &ItemId,
        ty: &TypeDescriptor,
        matched: &[usize],
        binder: &mut dyn Binder,
    ) -> Result<(), ExtkitError> {
        let mut bound_by_installer = false;
        for &index in matched {
            let installer = &mut self.installers[index];
            let installer_name = installer.handle.type_name();
            tracing::debug!(extension = %id, installer = installer_name, "Extension recognized");

            if let InstallerHandle::Binding(binding) = &mut installer.handle {
                binding
                    .bind(binder, ty)
                    .map_err(|source| ExtkitError::InstallationFailure {
                        installer: installer_name.to_string(),
                        extension: ty.name().to_string(),
                        source,
                    })?;
                bound_by_installer = true;
            }
            installer.extensions.push(ty.clone());
            if let Some(info) = ctx.info_mut(id) {
                info.installed_by.push(installer_name.to_string());
            }
        }

        if ty.is_lazy() {
            tracing::trace!(extension = %id, "Lazy extension left to just-in-time binding");
        } else if !bound_by_installer && !binder.is_bound(ty.name()) {
            binder
                .bind_type(ty, BindingScope::Singleton)
                .map_err(|source| ExtkitError::InstallationFailure {
                    installer: self.installers[matched[0]].handle.type_name().to_string(),
                    extension: ty.name().to_string(),
                    source,
                })?;
        }
        Ok(())
    }

    fn unrecognized(&self, ctx: &mut ConfigurationContext, id: &ItemId) -> Result<(), ExtkitError> {
        let optional = ctx.info(id).is_some_and(|info| info.optional);
        if optional {
            tracing::debug!(extension = %id, "Optional extension not recognized, disabling");
            let name = id.type_name().to_string();
            ctx.with_scope(ConfigScope::OptionalExtensionDisabler.id(), |ctx| {
                ctx.disable_matching(Disable::type_name(name).and(Disable::extension()))
            })
        } else {
            tracing::warn!(
                extension = %id,
                "Extension not recognized by any installer, it stays inert"
            );
            Ok(())
        }
    }

    /// Pass 2, installation half: every installer in pipeline order receives
    /// its extensions. Instance installers get one injector instance per
    /// extension, shared between installers.
    pub fn install(
        &mut self,
        ctx: &mut ConfigurationContext,
        injector: &dyn Injector,
    ) -> Result<usize, ExtkitError> {
        ctx.set_phase(ConfigPhase::Injector);
        let mut resolved: HashMap<String, SharedInstance> = HashMap::new();

        for installer in &mut self.installers {
            let installer_name = installer.handle.type_name();
            let mut extensions = installer.extensions.clone();
            if installer.handle.orders_extensions() {
                extensions.sort_by_key(|ty| {
                    let order = ty.order();
                    (order.is_none(), order.unwrap_or_default())
                });
                installer.extensions.clone_from(&extensions);
            }

            for ty in &extensions {
                let failed = |source: anyhow::Error| ExtkitError::InstallationFailure {
                    installer: installer_name.to_string(),
                    extension: ty.name().to_string(),
                    source,
                };
                match &mut installer.handle {
                    InstallerHandle::Binding(_) => {}
                    InstallerHandle::Type(inner) => inner.install(ty).map_err(failed)?,
                    InstallerHandle::Instance(inner) => {
                        let instance = match resolved.get(ty.name()) {
                            Some(instance) => Arc::clone(instance),
                            None => {
                                let instance = injector.instance(ty).map_err(|source| {
                                    ExtkitError::ExtensionResolution {
                                        extension: ty.name().to_string(),
                                        source,
                                    }
                                })?;
                                resolved.insert(ty.name().to_string(), Arc::clone(&instance));
                                instance
                            }
                        };
                        inner.install(ty, instance).map_err(failed)?;
                    }
                }
                self.installed += 1;
                tracing::trace!(installer = installer_name, extension = ty.name(), "Installed");
            }
        }

        for installer in &mut self.installers {
            installer.handle.report();
        }
        tracing::info!(installations = self.installed, "Extensions installed");
        Ok(self.installed)
    }

    pub fn infos(&self) -> Vec<InstallerInfo> {
        self.installers.iter().map(InstallerDescriptor::info).collect()
    }
}
