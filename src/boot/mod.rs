//! Unattended-install boot arguments per OS family.
//!
//! A small strategy table keyed by OS family instead of an inheritance
//! hierarchy: each family renders the same capability set — paravirtual
//! kernel arguments, HVM arguments and static/DHCP network parameters —
//! with family-specific installer syntax (preseed for Debian and Ubuntu,
//! kickstart for CentOS).

use std::collections::BTreeMap;

use crate::error::{Result, XenError};

/// Supported OS families for unattended installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Debian,
    Ubuntu,
    CentOs,
}

impl OsFamily {
    /// Choose a family from an `os_kind` string such as `"ubuntu 16.04"`.
    pub fn from_os_kind(os_kind: &str) -> Option<Self> {
        if os_kind.starts_with("ubuntu") {
            Some(OsFamily::Ubuntu)
        } else if os_kind.starts_with("debian") {
            Some(OsFamily::Debian)
        } else if os_kind.starts_with("centos") {
            Some(OsFamily::CentOs)
        } else {
            None
        }
    }

    fn default_mirror(self) -> Option<&'static str> {
        match self {
            OsFamily::Debian => Some("http://ftp.debian.org/debian/"),
            OsFamily::Ubuntu => Some("http://archive.ubuntu.com/ubuntu/"),
            OsFamily::CentOs => None,
        }
    }

    /// Release codename for a version number, where the family names its
    /// releases. Already-codename inputs pass through.
    fn release_name(self, version: &str) -> Option<&'static str> {
        let table: &[(&str, &str)] = match self {
            OsFamily::Debian => &[("7", "wheezy"), ("8", "jessie"), ("9", "stretch")],
            OsFamily::Ubuntu => &[
                ("12.04", "precise"),
                ("14.04", "trusty"),
                ("14.10", "utopic"),
                ("15.04", "vivid"),
                ("15.10", "willy"),
                ("16.04", "xenial"),
                ("16.10", "yakkety"),
                ("17.04", "zesty"),
                ("17.10", "artful"),
            ],
            OsFamily::CentOs => &[],
        };
        table
            .iter()
            .find(|(num, name)| *num == version || *name == version)
            .map(|(_, name)| *name)
    }
}

/// Installer boot parameters for one guest.
#[derive(Debug, Clone)]
pub struct BootParams {
    family: OsFamily,
    hostname: String,
    dhcp: bool,
    ip_args: Option<String>,
    scenario: Option<String>,
    other_config: BTreeMap<String, String>,
}

impl BootParams {
    /// Parameters for an explicit family.
    pub fn new(family: OsFamily, hostname: impl Into<String>) -> Self {
        Self {
            family,
            hostname: hostname.into(),
            dhcp: true,
            ip_args: None,
            scenario: None,
            other_config: BTreeMap::new(),
        }
    }

    /// Parameters chosen from an `os_kind` string; picks the family and
    /// records the release in other-config where the family names one.
    pub fn for_os_kind(os_kind: &str, hostname: impl Into<String>) -> Option<Self> {
        let family = OsFamily::from_os_kind(os_kind)?;
        let mut params = Self::new(family, hostname);
        if let Some(version) = os_kind.split_whitespace().nth(1) {
            if let Some(release) = family.release_name(version) {
                params
                    .other_config
                    .insert("debian-release".to_string(), release.to_string());
            }
        }
        Some(params)
    }

    /// The family this guest installs as.
    pub fn family(&self) -> OsFamily {
        self.family
    }

    /// Record the answer-file URL with family-specific installer syntax.
    pub fn set_scenario(&mut self, url: &str) {
        self.scenario = Some(match self.family {
            OsFamily::Debian | OsFamily::Ubuntu => format!("preseed/url={url}"),
            OsFamily::CentOs => format!("ks={url}"),
        });
    }

    /// Record the package mirror, falling back to the family default.
    pub fn set_install_url(&mut self, url: Option<&str>) {
        let Some(url) = url.or_else(|| self.family.default_mirror()) else {
            return;
        };
        self.other_config
            .insert("install-repository".to_string(), url.to_string());
        self.other_config
            .insert("default-mirror".to_string(), url.to_string());
    }

    /// Configure networking. No `ip` means DHCP; a static `ip` requires
    /// both gateway and netmask.
    pub fn set_network_parameters(
        &mut self,
        ip: Option<&str>,
        gateway: Option<&str>,
        netmask: Option<&str>,
        dns1: Option<&str>,
        dns2: Option<&str>,
    ) -> Result<()> {
        let Some(ip) = ip else {
            self.dhcp = true;
            self.ip_args = None;
            return Ok(());
        };
        let gateway = gateway.ok_or_else(|| {
            XenError::InvalidArgument(
                "network configuration: IP specified without a gateway".into(),
            )
        })?;
        let netmask = netmask.ok_or_else(|| {
            XenError::InvalidArgument(
                "network configuration: IP specified without a netmask".into(),
            )
        })?;

        self.ip_args = Some(match self.family {
            OsFamily::Debian | OsFamily::Ubuntu => {
                let mut args = format!(
                    "ipv6.disable=1 netcfg/disable_autoconfig=true \
                     netcfg/use_autoconfig=false netcfg/confirm_static=true \
                     netcfg/get_ipaddress={ip} netcfg/get_gateway={gateway} \
                     netcfg/get_netmask={netmask}"
                );
                if let Some(dns1) = dns1 {
                    args.push_str(&format!(" netcfg/get_nameservers={dns1}"));
                }
                args
            }
            OsFamily::CentOs => {
                let mut args = format!("ip={ip}::{gateway}:{netmask}");
                if let Some(dns1) = dns1 {
                    args.push_str(&format!(":::off:{dns1}"));
                    if let Some(dns2) = dns2 {
                        args.push_str(&format!(":{dns2}"));
                    }
                }
                args
            }
        });
        self.dhcp = false;
        Ok(())
    }

    /// Kernel command line for a paravirtualized installer boot.
    pub fn pv_args(&self) -> String {
        match self.family {
            OsFamily::Debian | OsFamily::Ubuntu => {
                let network = if self.dhcp {
                    "netcfg/disable_dhcp=false".to_string()
                } else {
                    self.ip_args.clone().unwrap_or_default()
                };
                format!(
                    "auto=true console=hvc0 debian-installer/locale=en_US \
                     console-setup/layoutcode=us console-setup/ask_detect=false \
                     interface=eth0 {network} netcfg/get_hostname={hostname} {scenario} --",
                    hostname = self.hostname,
                    scenario = self.scenario.as_deref().unwrap_or_default(),
                )
            }
            OsFamily::CentOs => format!(
                "{} {}",
                self.ip_args.as_deref().unwrap_or_default(),
                self.scenario.as_deref().unwrap_or_default()
            ),
        }
    }

    /// Arguments for an HVM installer boot: the same installer directives
    /// without the paravirtual console setup.
    pub fn hvm_args(&self) -> String {
        format!(
            "{} {}",
            self.ip_args.as_deref().unwrap_or_default(),
            self.scenario.as_deref().unwrap_or_default()
        )
        .trim()
        .to_string()
    }

    /// Other-config entries to attach to the guest record.
    pub fn other_config(&self) -> &BTreeMap<String, String> {
        &self.other_config
    }
}
