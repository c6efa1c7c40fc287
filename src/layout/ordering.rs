use std::collections::VecDeque;

use super::FamilyGraph;

/// Distance between the centres of two partners placed side by side.
pub(super) const COUPLE_SPACING: f32 = 1.0;
/// Distance between neighbouring units that share parents.
const SIBLING_SPACING: f32 = 1.0;
/// Distance between neighbouring units from different families.
const FAMILY_SPACING: f32 = 1.25;
/// Extra width per non-adjacent partnership crossing a gap, so the lane
/// connector has room to drop between the nodes it passes.
const LANE_RESERVE: f32 = 0.2;

/// Row membership (left to right) and offsets for every node.
#[derive(Debug, Clone)]
pub(super) struct Placement {
    pub(super) rows: Vec<Vec<usize>>,
    pub(super) x: Vec<f32>,
}

/// Same-row partners kept together, left to right.
#[derive(Debug, Clone)]
struct Unit {
    members: Vec<usize>,
    /// Member offsets relative to the first member.
    local: Vec<f32>,
    width: f32,
}

impl Unit {
    fn first_node(&self) -> usize {
        self.members.iter().copied().min().unwrap_or(usize::MAX)
    }
}

struct Context<'a> {
    graph: &'a FamilyGraph,
    rows: &'a [usize],
    partner_adj: Vec<Vec<usize>>,
}

impl Context<'_> {
    /// Midpoint of the node's parents placed above it.
    fn parent_anchor(&self, node: usize, x: &[f32]) -> Option<f32> {
        mean(
            self.graph.parents[node]
                .iter()
                .filter(|&&p| self.rows[p] < self.rows[node])
                .map(|&p| x[p]),
        )
    }

    fn children_center(&self, node: usize, x: &[f32]) -> Option<f32> {
        mean(
            self.graph.kids[node]
                .iter()
                .filter(|&&k| self.rows[k] > self.rows[node])
                .map(|&k| x[k]),
        )
    }

    /// Parents placed above the unit's first member that has any.
    fn family_key(&self, unit: &Unit) -> Option<Vec<usize>> {
        unit.members.iter().find_map(|&m| {
            let mut above: Vec<usize> = self.graph.parents[m]
                .iter()
                .copied()
                .filter(|&p| self.rows[p] < self.rows[m])
                .collect();
            if above.is_empty() {
                return None;
            }
            above.sort_unstable();
            Some(above)
        })
    }

    fn sibling_rank(&self, unit: &Unit) -> usize {
        unit.members
            .iter()
            .map(|&m| self.graph.sibling_rank[m])
            .min()
            .unwrap_or(usize::MAX)
    }

    /// Where the unit's first member should go so every anchored member is,
    /// on average, right over (or under) its anchor.
    fn desired_left(&self, unit: &Unit, anchor: impl Fn(usize) -> Option<f32>) -> Option<f32> {
        mean(
            unit.members
                .iter()
                .zip(unit.local.iter())
                .filter_map(|(&m, &local)| anchor(m).map(|a| a - local)),
        )
    }

    fn build_unit(&self, members: &[usize], x: &[f32]) -> Unit {
        let mut order = arrange_members(members, &self.partner_adj);
        let anchored: Vec<f32> = order
            .iter()
            .filter_map(|&m| self.parent_anchor(m, x))
            .collect();
        if let (Some(first), Some(last)) = (anchored.first(), anchored.last())
            && first > last
        {
            order.reverse();
        }

        let position: Vec<(usize, usize)> = order.iter().copied().enumerate().collect();
        let pos_of = |node: usize| position.iter().find(|(_, m)| *m == node).map(|(p, _)| *p);
        let mut spans: Vec<(usize, usize)> = Vec::new();
        for &u in &order {
            for &v in &self.partner_adj[u] {
                if u < v
                    && let (Some(pu), Some(pv)) = (pos_of(u), pos_of(v))
                    && pu.abs_diff(pv) > 1
                {
                    spans.push((pu.min(pv), pu.max(pv)));
                }
            }
        }

        let mut local = Vec::with_capacity(order.len());
        let mut cursor = 0.0f32;
        for idx in 0..order.len() {
            if idx > 0 {
                let crossing = spans
                    .iter()
                    .filter(|&&(lo, hi)| lo < idx && idx <= hi)
                    .count();
                cursor += COUPLE_SPACING + LANE_RESERVE * crossing as f32;
            }
            local.push(cursor);
        }
        Unit {
            members: order,
            width: cursor,
            local,
        }
    }

    /// Spacing before each unit; index 0 is unused.
    fn gaps(&self, units: &[Unit]) -> Vec<f32> {
        let keys: Vec<Option<Vec<usize>>> = units.iter().map(|u| self.family_key(u)).collect();
        (0..units.len())
            .map(|idx| {
                if idx == 0 {
                    0.0
                } else if keys[idx].is_some() && keys[idx] == keys[idx - 1] {
                    SIBLING_SPACING
                } else {
                    FAMILY_SPACING
                }
            })
            .collect()
    }

    /// Desired lefts from parent anchors, with consecutive siblings centred
    /// as one block under their parents.
    fn desired_from_parents(&self, units: &[Unit], gaps: &[f32], x: &[f32]) -> Vec<Option<f32>> {
        let mut desired: Vec<Option<f32>> = units
            .iter()
            .map(|unit| self.desired_left(unit, |m| self.parent_anchor(m, x)))
            .collect();
        let keys: Vec<Option<Vec<usize>>> = units.iter().map(|u| self.family_key(u)).collect();
        let mut start = 0;
        while start < units.len() {
            let mut end = start + 1;
            while end < units.len() && keys[start].is_some() && keys[end] == keys[start] {
                end += 1;
            }
            if end - start > 1 && desired[start..end].iter().all(Option::is_some) {
                let centers: Vec<f32> = (start..end)
                    .filter_map(|i| desired[i].map(|left| left + units[i].width / 2.0))
                    .collect();
                let center = centers.iter().sum::<f32>() / centers.len() as f32;
                let span: f32 = (start..end).map(|i| units[i].width).sum::<f32>()
                    + (start + 1..end).map(|i| gaps[i]).sum::<f32>();
                let mut cursor = center - span / 2.0;
                for i in start..end {
                    if i > start {
                        cursor += gaps[i];
                    }
                    desired[i] = Some(cursor);
                    cursor += units[i].width;
                }
            }
            start = end;
        }
        desired
    }

    fn write_row(units: &[Unit], lefts: &[f32], x: &mut [f32]) {
        for (unit, left) in units.iter().zip(lefts.iter()) {
            for (&m, &local) in unit.members.iter().zip(unit.local.iter()) {
                x[m] = left + local;
            }
        }
    }
}

/// Orders and places every row.
///
/// Rows are ordered once, top-down, by the barycenter of the parents above
/// (ties: children-list order, then input order). Offsets are then refined
/// bottom-up towards children and top-down towards parents again.
pub(super) fn place(graph: &FamilyGraph, rows: &[usize]) -> Placement {
    let n = graph.len();
    let row_count = rows.iter().copied().max().map_or(0, |max| max + 1);
    let mut partner_adj: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (a, b) in graph.partner_pairs() {
        if rows[a] == rows[b] {
            partner_adj[a].push(b);
            partner_adj[b].push(a);
        }
    }
    let ctx = Context {
        graph,
        rows,
        partner_adj,
    };

    let mut components_by_row: Vec<Vec<Vec<usize>>> = vec![Vec::new(); row_count];
    for component in components(n, &ctx.partner_adj) {
        components_by_row[rows[component[0]]].push(component);
    }

    let mut x = vec![0.0f32; n];
    let mut units_by_row: Vec<Vec<Unit>> = Vec::with_capacity(row_count);
    for components in &components_by_row {
        let mut units: Vec<Unit> = components
            .iter()
            .map(|members| ctx.build_unit(members, &x))
            .collect();
        order_units(&ctx, &mut units, &x);
        let gaps = ctx.gaps(&units);
        let desired = ctx.desired_from_parents(&units, &gaps, &x);
        let lefts = place_row(&units, &gaps, &fill_unanchored(&units, &gaps, &desired));
        Context::write_row(&units, &lefts, &mut x);
        units_by_row.push(units);
    }

    for units in units_by_row.iter().rev().skip(1) {
        let gaps = ctx.gaps(units);
        let desired: Vec<f32> = units
            .iter()
            .map(|unit| {
                ctx.desired_left(unit, |m| ctx.children_center(m, &x))
                    .unwrap_or(x[unit.members[0]])
            })
            .collect();
        let lefts = place_row(units, &gaps, &desired);
        Context::write_row(units, &lefts, &mut x);
    }

    for units in units_by_row.iter().skip(1) {
        let gaps = ctx.gaps(units);
        let desired: Vec<f32> = ctx
            .desired_from_parents(units, &gaps, &x)
            .into_iter()
            .zip(units.iter())
            .map(|(desired, unit)| desired.unwrap_or(x[unit.members[0]]))
            .collect();
        let lefts = place_row(units, &gaps, &desired);
        Context::write_row(units, &lefts, &mut x);
    }

    if let Some(min) = x.iter().copied().reduce(f32::min) {
        for value in &mut x {
            *value -= min;
        }
    }

    Placement {
        rows: units_by_row
            .iter()
            .map(|units| units.iter().flat_map(|u| u.members.iter().copied()).collect())
            .collect(),
        x,
    }
}

/// Stable barycenter sort. Units with no parents above inherit the key of
/// the unit before them so they stay next to their input-order neighbours.
fn order_units(ctx: &Context<'_>, units: &mut Vec<Unit>, x: &[f32]) {
    if units.len() <= 1 {
        return;
    }
    units.sort_by_key(Unit::first_node);
    let mut last_key = f32::NEG_INFINITY;
    let mut keyed: Vec<(f32, usize, usize, Unit)> = units
        .drain(..)
        .map(|unit| {
            let key = mean(unit.members.iter().filter_map(|&m| ctx.parent_anchor(m, x)));
            let key = match key {
                Some(key) => {
                    last_key = key;
                    key
                }
                None => last_key,
            };
            (key, ctx.sibling_rank(&unit), unit.first_node(), unit)
        })
        .collect();
    keyed.sort_by(|a, b| {
        a.0.total_cmp(&b.0)
            .then(a.1.cmp(&b.1))
            .then(a.2.cmp(&b.2))
    });
    units.extend(keyed.into_iter().map(|(_, _, _, unit)| unit));
}

/// Units with no anchor follow their left neighbour (or precede the first
/// anchored unit); an entirely unanchored row is packed from 0.
fn fill_unanchored(units: &[Unit], gaps: &[f32], desired: &[Option<f32>]) -> Vec<f32> {
    let mut out = vec![0.0f32; units.len()];
    let Some(first) = desired.iter().position(Option::is_some) else {
        let mut cursor = 0.0;
        for (idx, unit) in units.iter().enumerate() {
            cursor += gaps[idx];
            out[idx] = cursor;
            cursor += unit.width;
        }
        return out;
    };
    out[first] = desired[first].unwrap_or_default();
    for idx in (0..first).rev() {
        out[idx] = out[idx + 1] - gaps[idx + 1] - units[idx].width;
    }
    for idx in first + 1..units.len() {
        out[idx] = match desired[idx] {
            Some(left) => left,
            None => out[idx - 1] + units[idx - 1].width + gaps[idx],
        };
    }
    out
}

/// Greedy placement towards `desired` lefts without overlap.
///
/// One sweep pushes units right, the other pushes them left; both results
/// respect the spacing so their average does too, and crowded groups end up
/// centred on their targets instead of drifting to one side.
fn place_row(units: &[Unit], gaps: &[f32], desired: &[f32]) -> Vec<f32> {
    let count = units.len();
    let mut rightward = vec![0.0f32; count];
    for idx in 0..count {
        rightward[idx] = if idx == 0 {
            desired[0]
        } else {
            desired[idx].max(rightward[idx - 1] + units[idx - 1].width + gaps[idx])
        };
    }
    let mut leftward = vec![0.0f32; count];
    for idx in (0..count).rev() {
        leftward[idx] = if idx + 1 == count {
            desired[idx]
        } else {
            desired[idx].min(leftward[idx + 1] - gaps[idx + 1] - units[idx].width)
        };
    }
    rightward
        .iter()
        .zip(leftward.iter())
        .map(|(r, l)| (r + l) / 2.0)
        .collect()
}

/// Left-to-right member order for one cluster of same-row partners.
///
/// Chains are walked end to end; anything else is laid out breadth-first
/// around its best-connected member, with that member's first partner on
/// its left.
fn arrange_members(members: &[usize], adj: &[Vec<usize>]) -> Vec<usize> {
    if members.len() <= 1 {
        return members.to_vec();
    }
    let is_chain = members.iter().all(|&m| adj[m].len() <= 2);
    if is_chain && let Some(start) = members.iter().copied().find(|&m| adj[m].len() == 1) {
        let mut order = vec![start];
        let mut prev: Option<usize> = None;
        let mut current = start;
        while let Some(&next) = adj[current].iter().find(|&&nb| Some(nb) != prev) {
            order.push(next);
            prev = Some(current);
            current = next;
        }
        return order;
    }

    let hub = members
        .iter()
        .copied()
        .max_by(|&a, &b| adj[a].len().cmp(&adj[b].len()).then(b.cmp(&a)))
        .unwrap_or(members[0]);
    let mut seen = vec![hub];
    let mut queue = VecDeque::from([hub]);
    while let Some(node) = queue.pop_front() {
        for &nb in &adj[node] {
            if !seen.contains(&nb) {
                seen.push(nb);
                queue.push_back(nb);
            }
        }
    }
    let mut order = Vec::with_capacity(seen.len());
    order.push(seen[1]);
    order.push(hub);
    order.extend(seen.iter().skip(2).copied());
    order
}

/// Connected components of `adj`, each sorted, ordered by smallest node.
fn components(n: usize, adj: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let mut seen = vec![false; n];
    let mut out = Vec::new();
    for start in 0..n {
        if seen[start] {
            continue;
        }
        seen[start] = true;
        let mut component = vec![start];
        let mut queue = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            for &nb in &adj[node] {
                if !seen[nb] {
                    seen[nb] = true;
                    component.push(nb);
                    queue.push_back(nb);
                }
            }
        }
        component.sort_unstable();
        out.push(component);
    }
    out
}

fn mean(values: impl Iterator<Item = f32>) -> Option<f32> {
    let (sum, count) = values.fold((0.0f32, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f32)
}
