use crate::lane::Lane;
use crate::VehicleSet;
use itertools::Itertools;

/// Renders a lane as a row of cells, each showing the ID of the vehicle in it, if any.
pub fn render_lane(lane: &Lane, vehicles: &VehicleSet) -> String {
    (0..lane.size())
        .map(|site| match lane.vehicle_at(site).and_then(|key| vehicles.get(key)) {
            Some(veh) => format!("[{:>3}]", veh.id()),
            None => "[   ]".to_string(),
        })
        .join("")
}
