//! XML configuration load/store.
//!
//! The schema is the `DYNAMOconfig` root with `Simulation`, `Species`,
//! `Interactions`, `Locals`, `Globals`, `Systems` and `ParticleData`
//! children. Uncompressed files only: callers decompress `.bz2` archives
//! before handing bytes over. Unknown type strings and missing required
//! attributes are configuration errors.

use crate::boundary::BoundaryCondition;
use crate::core::{SimTime, Species};
use crate::dynamics::Dynamics;
use crate::error::{Error, Result};
use crate::interaction::InteractionSpec;
use crate::locals::LocalSpec;
use crate::math::Vec3;
use crate::ranges::{IdPairRange, IdRange};
use crate::scheduler::Strategy;
use crate::simulation::Simulation;
use crate::systems::SystemSpec;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event as XmlEvent};
use quick_xml::{Reader, Writer};
use std::collections::HashMap;
use std::path::Path;

/// Load a simulation from an uncompressed XML file.
pub fn load_xml_file<P: AsRef<Path>>(path: P) -> Result<Simulation> {
    let xml = std::fs::read_to_string(path)?;
    from_xml_str(&xml)
}

/// Write a simulation to an uncompressed XML file. Particles are streamed
/// to the current system time first so the serialised phase-space point is
/// simultaneous.
pub fn write_xml_file<P: AsRef<Path>>(sim: &mut Simulation, path: P) -> Result<()> {
    sim.sync_particles();
    let xml = to_xml_string(sim)?;
    std::fs::write(path, xml)?;
    Ok(())
}

// ---------------------------------------------------------------- parsing

/// A parsed element: name, attributes, children. Character data is not
/// part of the schema and is dropped.
#[derive(Debug, Default)]
struct Node {
    name: String,
    attrs: HashMap<String, String>,
    children: Vec<Node>,
}

impl Node {
    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    fn req_attr(&self, key: &str) -> Result<&str> {
        self.attr(key).ok_or_else(|| {
            Error::Config(format!(
                "element <{}> is missing required attribute \"{key}\"",
                self.name
            ))
        })
    }

    fn f64_attr(&self, key: &str) -> Result<f64> {
        parse_f64(self.req_attr(key)?, &self.name, key)
    }

    fn u64_attr(&self, key: &str) -> Result<u64> {
        self.req_attr(key)?.parse().map_err(|_| {
            Error::Config(format!(
                "attribute \"{key}\" of <{}> is not an integer",
                self.name
            ))
        })
    }

    fn usize_attr(&self, key: &str) -> Result<usize> {
        Ok(self.u64_attr(key)? as usize)
    }

    fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    fn req_child(&self, name: &str) -> Result<&Node> {
        self.child(name).ok_or_else(|| {
            Error::Config(format!(
                "element <{}> is missing required child <{name}>",
                self.name
            ))
        })
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> {
        self.children.iter().filter(move |c| c.name == name)
    }

    fn vec3(&self) -> Result<Vec3> {
        Ok(Vec3::new(
            self.f64_attr("x")?,
            self.f64_attr("y")?,
            self.f64_attr("z")?,
        ))
    }
}

fn parse_f64(raw: &str, element: &str, key: &str) -> Result<f64> {
    raw.parse().map_err(|_| {
        Error::Config(format!(
            "attribute \"{key}\" of <{element}> is not a number: \"{raw}\""
        ))
    })
}

fn node_from(e: &BytesStart<'_>) -> Result<Node> {
    let mut node = Node {
        name: String::from_utf8_lossy(e.name().as_ref()).to_string(),
        ..Node::default()
    };
    for attr in e.attributes() {
        let attr = attr.map_err(|err| Error::Config(format!("malformed attribute: {err}")))?;
        node.attrs.insert(
            String::from_utf8_lossy(attr.key.as_ref()).to_string(),
            String::from_utf8_lossy(&attr.value).to_string(),
        );
    }
    Ok(node)
}

fn parse_tree(xml: &str) -> Result<Node> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut stack = vec![Node::default()];
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(XmlEvent::Start(e)) => stack.push(node_from(&e)?),
            Ok(XmlEvent::Empty(e)) => {
                let node = node_from(&e)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => return Err(Error::Config("unbalanced XML document".into())),
                }
            }
            Ok(XmlEvent::End(_)) => {
                let node = match stack.pop() {
                    Some(node) if !stack.is_empty() => node,
                    _ => return Err(Error::Config("unbalanced XML document".into())),
                };
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(node);
                }
            }
            Ok(XmlEvent::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(Error::Xml(e)),
        }
        buf.clear();
    }
    match stack.pop() {
        Some(root) if stack.is_empty() => Ok(root),
        _ => Err(Error::Config("unbalanced XML document".into())),
    }
}

fn parse_id_range(node: &Node) -> Result<IdRange> {
    match node.req_attr("Type")? {
        "All" => Ok(IdRange::All),
        "Ranged" => Ok(IdRange::Ranged {
            start: node.usize_attr("Start")?,
            end: node.usize_attr("End")?,
        }),
        "List" => {
            let ids = node
                .req_attr("IDs")?
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| {
                    s.trim().parse().map_err(|_| {
                        Error::Config(format!("bad ID \"{s}\" in <IDRange> list"))
                    })
                })
                .collect::<Result<Vec<usize>>>()?;
            Ok(IdRange::List(ids))
        }
        other => Err(Error::Config(format!("unknown IDRange type \"{other}\""))),
    }
}

fn parse_pair_range(node: &Node) -> Result<IdPairRange> {
    match node.req_attr("Type")? {
        "All" => Ok(IdPairRange::All),
        "Single" => Ok(IdPairRange::Single(parse_id_range(
            node.req_child("IDRange")?,
        )?)),
        "Pair" => {
            let mut ranges = node.children_named("IDRange");
            let a = ranges.next().ok_or_else(|| {
                Error::Config("IDPairRange type \"Pair\" needs two <IDRange> children".into())
            })?;
            let b = ranges.next().ok_or_else(|| {
                Error::Config("IDPairRange type \"Pair\" needs two <IDRange> children".into())
            })?;
            Ok(IdPairRange::Pair(parse_id_range(a)?, parse_id_range(b)?))
        }
        "Chain" => Ok(IdPairRange::Chain {
            start: node.usize_attr("Start")?,
            end: node.usize_attr("End")?,
        }),
        "None" => Ok(IdPairRange::None),
        other => Err(Error::Config(format!(
            "unknown IDPairRange type \"{other}\""
        ))),
    }
}

fn parse_interaction(node: &Node) -> Result<InteractionSpec> {
    let name = node.req_attr("Name")?.to_string();
    let range = parse_pair_range(node.req_child("IDPairRange")?)?;
    match node.req_attr("Type")? {
        "HardSphere" => Ok(InteractionSpec::HardSphere {
            name,
            diameter: node.f64_attr("Diameter")?,
            elasticity: node.f64_attr("Elasticity")?,
            range,
        }),
        "SquareWell" => Ok(InteractionSpec::SquareWell {
            name,
            diameter: node.f64_attr("Diameter")?,
            lambda: node.f64_attr("Lambda")?,
            well_depth: node.f64_attr("WellDepth")?,
            elasticity: node.f64_attr("Elasticity")?,
            range,
        }),
        "Stepped" => {
            let steps = node
                .children_named("Step")
                .map(|s| Ok((s.f64_attr("R")?, s.f64_attr("E")?)))
                .collect::<Result<Vec<_>>>()?;
            Ok(InteractionSpec::Stepped {
                name,
                steps,
                elasticity: node.f64_attr("Elasticity")?,
                range,
            })
        }
        "Null" => Ok(InteractionSpec::Null { name, range }),
        other => Err(Error::Config(format!(
            "unknown interaction type \"{other}\""
        ))),
    }
}

fn parse_local(node: &Node) -> Result<LocalSpec> {
    let name = node.req_attr("Name")?.to_string();
    let range = parse_id_range(node.req_child("IDRange")?)?;
    let elasticity = node.f64_attr("Elasticity")?;
    match node.req_attr("Type")? {
        "Wall" => Ok(LocalSpec::Wall {
            name,
            normal: node.req_child("Norm")?.vec3()?,
            origin: node.req_child("Origin")?.vec3()?,
            offset: node.f64_attr("Offset")?,
            elasticity,
            range,
        }),
        "Sphere" => Ok(LocalSpec::FixedSphere {
            name,
            center: node.req_child("Center")?.vec3()?,
            radius: node.f64_attr("Radius")?,
            inverse: node.attr("Inverse") == Some("Y"),
            elasticity,
            range,
        }),
        other => Err(Error::Config(format!("unknown local type \"{other}\""))),
    }
}

fn parse_system(node: &Node) -> Result<SystemSpec> {
    let name = node.req_attr("Name")?.to_string();
    match node.req_attr("Type")? {
        "Ticker" => Ok(SystemSpec::Ticker {
            name,
            period: node.f64_attr("Period")?,
        }),
        "Andersen" => Ok(SystemSpec::Andersen {
            name,
            rate: node.f64_attr("Rate")?,
            temperature: node.f64_attr("Temperature")?,
            range: parse_id_range(node.req_child("IDRange")?)?,
        }),
        "Rescale" => Ok(SystemSpec::Rescale {
            name,
            period: node.f64_attr("Period")?,
            temperature: node.f64_attr("Temperature")?,
            range: parse_id_range(node.req_child("IDRange")?)?,
        }),
        other => Err(Error::Config(format!("unknown system type \"{other}\""))),
    }
}

/// Parse a full configuration document.
pub fn from_xml_str(xml: &str) -> Result<Simulation> {
    let root = parse_tree(xml)?;
    let config = root.child("DYNAMOconfig").ok_or_else(|| {
        Error::Config("document has no <DYNAMOconfig> root element".into())
    })?;
    let sim_node = config.req_child("Simulation")?;

    let size = sim_node.req_child("SimulationSize")?.vec3()?;
    let bc_node = sim_node.req_child("BC")?;
    let bc = match bc_node.req_attr("Type")? {
        "PBC" => BoundaryCondition::periodic(size)?,
        "LE" => BoundaryCondition::lees_edwards(size, bc_node.f64_attr("Rate")?)?,
        other => {
            return Err(Error::Config(format!(
                "unknown boundary condition type \"{other}\""
            )))
        }
    };

    let dyn_node = sim_node.req_child("Dynamics")?;
    let dynamics = match dyn_node.req_attr("Type")? {
        "Newtonian" => match dyn_node.child("Gravity") {
            Some(g) => Dynamics::new(g.vec3()?),
            None => Dynamics::default(),
        },
        other => Err(Error::Config(format!(
            "unknown dynamics type \"{other}\""
        )))?,
    };

    let sched_node = sim_node.req_child("Scheduler")?;
    let strategy = match sched_node.req_attr("Type")? {
        "NeighbourList" => Strategy::NeighbourList,
        "Dumb" => Strategy::Dumb,
        other => {
            return Err(Error::Config(format!(
                "unknown scheduler type \"{other}\""
            )))
        }
    };
    if let Some(sorter) = sched_node.child("Sorter") {
        match sorter.req_attr("Type")? {
            "BoundedPQ" => {}
            other => {
                return Err(Error::Config(format!("unknown sorter type \"{other}\"")))
            }
        }
    }

    let seed = match sim_node.attr("Seed") {
        Some(raw) => raw.parse().map_err(|_| {
            Error::Config(format!("Seed attribute is not an integer: \"{raw}\""))
        })?,
        None => 0,
    };
    let mut sim = Simulation::new(bc, dynamics, strategy, seed);

    if let Some(counters) = sim_node.child("EventCounters") {
        sim.event_count = counters.u64_attr("Events")?;
        sim.end_event_count = counters.u64_attr("EndEvents")?;
        if let Some(raw) = counters.attr("PrintInterval") {
            sim.event_print_interval = raw.parse().map_err(|_| {
                Error::Config(format!("PrintInterval is not an integer: \"{raw}\""))
            })?;
        }
    }
    if let Some(time_node) = sim_node.child("SystemTime") {
        sim.system_time = SimTime::from_value(time_node.f64_attr("Time")?);
    }

    if let Some(species) = config.child("Species") {
        for sp in species.children_named("Sp") {
            sim.add_species(Species::new(
                sp.req_attr("Name")?,
                sp.f64_attr("Mass")?,
                parse_id_range(sp.req_child("IDRange")?)?,
            )?);
        }
    }
    if let Some(interactions) = config.child("Interactions") {
        for node in interactions.children_named("Interaction") {
            sim.add_interaction(parse_interaction(node)?.build()?);
        }
    }
    if let Some(locals) = config.child("Locals") {
        for node in locals.children_named("Local") {
            sim.add_local(parse_local(node)?.build()?);
        }
    }
    if let Some(globals) = config.child("Globals") {
        for node in globals.children_named("Global") {
            match node.req_attr("Type")? {
                // The cell global is rebuilt by initialise; its presence
                // here is informational.
                "Cells" => {}
                other => {
                    return Err(Error::Config(format!(
                        "unknown global type \"{other}\""
                    )))
                }
            }
        }
    }
    if let Some(systems) = config.child("Systems") {
        for node in systems.children_named("System") {
            sim.add_system(parse_system(node)?.build()?);
        }
    }

    let particle_data = config.req_child("ParticleData")?;
    let mut slots: Vec<Option<(Vec3, Vec3)>> = Vec::new();
    for pt in particle_data.children_named("Pt") {
        let id = pt.usize_attr("ID")?;
        let pos = pt.req_child("P")?.vec3()?;
        let vel = pt.req_child("V")?.vec3()?;
        if id >= slots.len() {
            slots.resize(id + 1, None);
        }
        if slots[id].replace((pos, vel)).is_some() {
            return Err(Error::Config(format!("duplicate particle ID {id}")));
        }
    }
    for (id, slot) in slots.into_iter().enumerate() {
        let (pos, vel) =
            slot.ok_or_else(|| Error::Config(format!("particle ID {id} is missing")))?;
        sim.add_particle(pos, vel)?;
    }

    Ok(sim)
}

// ---------------------------------------------------------------- writing

fn fmt_f64(v: f64) -> String {
    format!("{v:.17e}")
}

fn fmt_time(v: f64) -> String {
    format!("{v:.18e}")
}

type XmlWriter = Writer<Vec<u8>>;

fn start(w: &mut XmlWriter, name: &str, attrs: &[(&str, String)]) -> Result<()> {
    let mut el = BytesStart::new(name);
    for (k, v) in attrs {
        el.push_attribute((*k, v.as_str()));
    }
    w.write_event(XmlEvent::Start(el))?;
    Ok(())
}

fn empty(w: &mut XmlWriter, name: &str, attrs: &[(&str, String)]) -> Result<()> {
    let mut el = BytesStart::new(name);
    for (k, v) in attrs {
        el.push_attribute((*k, v.as_str()));
    }
    w.write_event(XmlEvent::Empty(el))?;
    Ok(())
}

fn end(w: &mut XmlWriter, name: &str) -> Result<()> {
    w.write_event(XmlEvent::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_vec3(w: &mut XmlWriter, name: &str, v: Vec3) -> Result<()> {
    empty(
        w,
        name,
        &[
            ("x", fmt_f64(v.x)),
            ("y", fmt_f64(v.y)),
            ("z", fmt_f64(v.z)),
        ],
    )
}

fn write_id_range(w: &mut XmlWriter, range: &IdRange) -> Result<()> {
    match range {
        IdRange::All => empty(w, "IDRange", &[("Type", "All".into())]),
        IdRange::Ranged { start, end } => empty(
            w,
            "IDRange",
            &[
                ("Type", "Ranged".into()),
                ("Start", start.to_string()),
                ("End", end.to_string()),
            ],
        ),
        IdRange::List(ids) => {
            let list = ids
                .iter()
                .map(usize::to_string)
                .collect::<Vec<_>>()
                .join(",");
            empty(
                w,
                "IDRange",
                &[("Type", "List".into()), ("IDs", list)],
            )
        }
    }
}

fn write_pair_range(w: &mut XmlWriter, range: &IdPairRange) -> Result<()> {
    match range {
        IdPairRange::All => empty(w, "IDPairRange", &[("Type", "All".into())]),
        IdPairRange::Single(r) => {
            start(w, "IDPairRange", &[("Type", "Single".into())])?;
            write_id_range(w, r)?;
            end(w, "IDPairRange")
        }
        IdPairRange::Pair(a, b) => {
            start(w, "IDPairRange", &[("Type", "Pair".into())])?;
            write_id_range(w, a)?;
            write_id_range(w, b)?;
            end(w, "IDPairRange")
        }
        IdPairRange::Chain { start: s, end: e } => empty(
            w,
            "IDPairRange",
            &[
                ("Type", "Chain".into()),
                ("Start", s.to_string()),
                ("End", e.to_string()),
            ],
        ),
        IdPairRange::None => empty(w, "IDPairRange", &[("Type", "None".into())]),
    }
}

fn write_interaction(w: &mut XmlWriter, spec: &InteractionSpec) -> Result<()> {
    match spec {
        InteractionSpec::HardSphere {
            name,
            diameter,
            elasticity,
            range,
        } => {
            start(
                w,
                "Interaction",
                &[
                    ("Type", "HardSphere".into()),
                    ("Name", name.clone()),
                    ("Diameter", fmt_f64(*diameter)),
                    ("Elasticity", fmt_f64(*elasticity)),
                ],
            )?;
            write_pair_range(w, range)?;
            end(w, "Interaction")
        }
        InteractionSpec::SquareWell {
            name,
            diameter,
            lambda,
            well_depth,
            elasticity,
            range,
        } => {
            start(
                w,
                "Interaction",
                &[
                    ("Type", "SquareWell".into()),
                    ("Name", name.clone()),
                    ("Diameter", fmt_f64(*diameter)),
                    ("Lambda", fmt_f64(*lambda)),
                    ("WellDepth", fmt_f64(*well_depth)),
                    ("Elasticity", fmt_f64(*elasticity)),
                ],
            )?;
            write_pair_range(w, range)?;
            end(w, "Interaction")
        }
        InteractionSpec::Stepped {
            name,
            steps,
            elasticity,
            range,
        } => {
            start(
                w,
                "Interaction",
                &[
                    ("Type", "Stepped".into()),
                    ("Name", name.clone()),
                    ("Elasticity", fmt_f64(*elasticity)),
                ],
            )?;
            for (radius, energy) in steps {
                empty(
                    w,
                    "Step",
                    &[("R", fmt_f64(*radius)), ("E", fmt_f64(*energy))],
                )?;
            }
            write_pair_range(w, range)?;
            end(w, "Interaction")
        }
        InteractionSpec::Null { name, range } => {
            start(
                w,
                "Interaction",
                &[("Type", "Null".into()), ("Name", name.clone())],
            )?;
            write_pair_range(w, range)?;
            end(w, "Interaction")
        }
    }
}

fn write_local(w: &mut XmlWriter, spec: &LocalSpec) -> Result<()> {
    match spec {
        LocalSpec::Wall {
            name,
            normal,
            origin,
            offset,
            elasticity,
            range,
        } => {
            start(
                w,
                "Local",
                &[
                    ("Type", "Wall".into()),
                    ("Name", name.clone()),
                    ("Elasticity", fmt_f64(*elasticity)),
                    ("Offset", fmt_f64(*offset)),
                ],
            )?;
            write_vec3(w, "Norm", *normal)?;
            write_vec3(w, "Origin", *origin)?;
            write_id_range(w, range)?;
            end(w, "Local")
        }
        LocalSpec::FixedSphere {
            name,
            center,
            radius,
            inverse,
            elasticity,
            range,
        } => {
            start(
                w,
                "Local",
                &[
                    ("Type", "Sphere".into()),
                    ("Name", name.clone()),
                    ("Elasticity", fmt_f64(*elasticity)),
                    ("Radius", fmt_f64(*radius)),
                    ("Inverse", if *inverse { "Y" } else { "N" }.into()),
                ],
            )?;
            write_vec3(w, "Center", *center)?;
            write_id_range(w, range)?;
            end(w, "Local")
        }
    }
}

fn write_system(w: &mut XmlWriter, spec: &SystemSpec) -> Result<()> {
    match spec {
        SystemSpec::Ticker { name, period } => empty(
            w,
            "System",
            &[
                ("Type", "Ticker".into()),
                ("Name", name.clone()),
                ("Period", fmt_f64(*period)),
            ],
        ),
        SystemSpec::Andersen {
            name,
            rate,
            temperature,
            range,
        } => {
            start(
                w,
                "System",
                &[
                    ("Type", "Andersen".into()),
                    ("Name", name.clone()),
                    ("Rate", fmt_f64(*rate)),
                    ("Temperature", fmt_f64(*temperature)),
                ],
            )?;
            write_id_range(w, range)?;
            end(w, "System")
        }
        SystemSpec::Rescale {
            name,
            period,
            temperature,
            range,
        } => {
            start(
                w,
                "System",
                &[
                    ("Type", "Rescale".into()),
                    ("Name", name.clone()),
                    ("Period", fmt_f64(*period)),
                    ("Temperature", fmt_f64(*temperature)),
                ],
            )?;
            write_id_range(w, range)?;
            end(w, "System")
        }
    }
}

/// Serialise a simulation to the configuration schema.
pub fn to_xml_string(sim: &Simulation) -> Result<String> {
    let mut w = Writer::new_with_indent(Vec::new(), b' ', 2);
    w.write_event(XmlEvent::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    start(&mut w, "DYNAMOconfig", &[("version", "1.5".into())])?;

    start(
        &mut w,
        "Simulation",
        &[("Seed", sim.rng_seed().to_string())],
    )?;
    {
        let strategy = match sim.scheduler.strategy {
            Strategy::NeighbourList => "NeighbourList",
            Strategy::Dumb => "Dumb",
        };
        start(&mut w, "Scheduler", &[("Type", strategy.into())])?;
        empty(&mut w, "Sorter", &[("Type", "BoundedPQ".into())])?;
        end(&mut w, "Scheduler")?;

        write_vec3(&mut w, "SimulationSize", sim.bc.primary_cell())?;
        match &sim.bc {
            BoundaryCondition::Periodic { .. } => {
                empty(&mut w, "BC", &[("Type", "PBC".into())])?;
            }
            BoundaryCondition::LeesEdwards { shear_rate, .. } => {
                empty(
                    &mut w,
                    "BC",
                    &[("Type", "LE".into()), ("Rate", fmt_f64(*shear_rate))],
                )?;
            }
        }

        if sim.dynamics.gravity.is_zero() {
            empty(&mut w, "Dynamics", &[("Type", "Newtonian".into())])?;
        } else {
            start(&mut w, "Dynamics", &[("Type", "Newtonian".into())])?;
            write_vec3(&mut w, "Gravity", sim.dynamics.gravity)?;
            end(&mut w, "Dynamics")?;
        }

        empty(
            &mut w,
            "EventCounters",
            &[
                ("Events", sim.event_count.to_string()),
                ("EndEvents", sim.end_event_count.to_string()),
                ("PrintInterval", sim.event_print_interval.to_string()),
            ],
        )?;
        empty(
            &mut w,
            "SystemTime",
            &[("Time", fmt_time(sim.system_time.current()))],
        )?;
    }
    end(&mut w, "Simulation")?;

    start(&mut w, "Species", &[])?;
    for sp in &sim.species {
        start(
            &mut w,
            "Sp",
            &[("Name", sp.name.clone()), ("Mass", fmt_f64(sp.mass))],
        )?;
        write_id_range(&mut w, &sp.range)?;
        end(&mut w, "Sp")?;
    }
    end(&mut w, "Species")?;

    start(&mut w, "Interactions", &[])?;
    for interaction in &sim.interactions {
        write_interaction(&mut w, &interaction.spec())?;
    }
    end(&mut w, "Interactions")?;

    start(&mut w, "Locals", &[])?;
    for local in &sim.locals {
        write_local(&mut w, &local.spec())?;
    }
    end(&mut w, "Locals")?;

    start(&mut w, "Globals", &[])?;
    if let Some(cells) = &sim.cells {
        empty(
            &mut w,
            "Global",
            &[("Type", "Cells".into()), ("Name", cells.name.clone())],
        )?;
    }
    end(&mut w, "Globals")?;

    start(&mut w, "Systems", &[])?;
    for system in &sim.systems {
        write_system(&mut w, &system.spec())?;
    }
    end(&mut w, "Systems")?;

    start(&mut w, "ParticleData", &[])?;
    for p in &sim.particles {
        start(&mut w, "Pt", &[("ID", p.id.to_string())])?;
        write_vec3(&mut w, "P", p.pos)?;
        write_vec3(&mut w, "V", p.vel)?;
        end(&mut w, "Pt")?;
    }
    end(&mut w, "ParticleData")?;

    end(&mut w, "DYNAMOconfig")?;
    String::from_utf8(w.into_inner())
        .map_err(|e| Error::Config(format!("serialised XML is not UTF-8: {e}")))
}
