//! Target platform selection.
//!
//! Several upstream image families only publish amd64 manifests. On an ARM
//! host those must run under emulation, so `auto` forces amd64 for them and
//! leaves every other combination on the native platform.

use labenv_schema::{BaseImageFamily, HostArch, PlatformMode, PlatformOverride, TargetArch};

/// Decide the platform override for a build. Pure.
pub fn select_platform(
    family: BaseImageFamily,
    host: HostArch,
    mode: PlatformMode,
) -> PlatformOverride {
    let selected = match mode {
        PlatformMode::ForceAmd64 => PlatformOverride::target(TargetArch::Amd64),
        PlatformMode::ForceArm64 => PlatformOverride::target(TargetArch::Arm64),
        PlatformMode::Native => PlatformOverride::NATIVE,
        PlatformMode::Auto if host.is_arm() && family.is_single_arch() => {
            PlatformOverride::target(TargetArch::Amd64)
        }
        PlatformMode::Auto => PlatformOverride::NATIVE,
    };

    tracing::debug!(%family, %host, %mode, platform = selected.as_str(), "selected platform");
    selected
}
