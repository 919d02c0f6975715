use beamtwin::{point, render_station_table, AnalyticSource, BeamTwin, TwinConfig, TwinInputs};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut vertices = Vec::new();
    for row in 0..3 {
        for column in 0..11 {
            vertices.push(point(
                f64::from(column) / 10.0,
                0.125 * f64::from(row),
                0.0,
            ));
        }
    }
    let mut twin = BeamTwin::initialize(vertices, TwinConfig::default(), AnalyticSource)?;

    let inputs = TwinInputs {
        load_value: 92_745.0,
        ..TwinInputs::default()
    };
    twin.tick(&inputs);

    println!("midspan uy = {:.3e} m", twin.positions()[5].y);
    println!("{}", render_station_table(twin.stations()));

    Ok(())
}
