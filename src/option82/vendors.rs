// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Built-in vendor rules

use super::{CIRCUIT_ID, CircuitFields, Option82Error, REMOTE_ID, SubOptions, VendorRule};

/// Rules shipped with the service, in match order
#[must_use]
pub fn builtin_rules() -> Vec<VendorRule> {
    vec![
        VendorRule {
            vendor: "zyxel-gs2200",
            matches: |model| model.starts_with("GS2200"),
            extract: extract_gs2200,
        },
        VendorRule {
            vendor: "hp-procurve",
            matches: |model| model.starts_with("ProCurve"),
            extract: extract_procurve,
        },
    ]
}

/// ZyXEL GS2200: circuit id is `slot, port, vlan, extra...`
fn extract_gs2200(sub_options: &mut SubOptions) -> Result<CircuitFields, Option82Error> {
    let circuit = sub_options
        .remove(&CIRCUIT_ID)
        .ok_or(Option82Error::MissingCircuitId)?;
    let [slot, port, vlan, extra @ ..] = circuit.as_slice() else {
        return Err(Option82Error::ShortCircuitId {
            vendor: "zyxel-gs2200",
            len: circuit.len(),
        });
    };

    Ok(CircuitFields {
        slot: Some(*slot),
        port: u32::from(*port),
        vlan: Some(u16::from(*vlan)),
        extra: extra.to_vec(),
    })
}

/// HP ProCurve: circuit id is the port number (big-endian), remote id the
/// switch MAC
fn extract_procurve(sub_options: &mut SubOptions) -> Result<CircuitFields, Option82Error> {
    let circuit = sub_options
        .remove(&CIRCUIT_ID)
        .ok_or(Option82Error::MissingCircuitId)?;
    if circuit.is_empty() || circuit.len() > 4 {
        return Err(Option82Error::ShortCircuitId {
            vendor: "hp-procurve",
            len: circuit.len(),
        });
    }
    let port = circuit
        .iter()
        .fold(0u32, |acc, b| (acc << 8) | u32::from(*b));

    Ok(CircuitFields {
        slot: None,
        port,
        vlan: None,
        extra: sub_options.remove(&REMOTE_ID).unwrap_or_default(),
    })
}
