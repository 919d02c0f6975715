use beamtwin::{point, AnalyticSource, BeamTwin, CrackSpec, TwinConfig, TwinInputs};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let vertices: Vec<_> = (0..=20)
        .flat_map(|column| {
            (0..=4).map(move |row| {
                point(f64::from(column) / 20.0, 0.25 * f64::from(row) / 4.0, 0.0)
            })
        })
        .collect();
    let mut twin = BeamTwin::initialize(vertices, TwinConfig::default(), AnalyticSource)?;

    let inputs = TwinInputs {
        load_value: 30_000.0,
        crack: CrackSpec {
            enabled: true,
            center_u: 0.3,
            radius: 0.08,
            ..CrackSpec::default()
        },
        ..TwinInputs::default()
    };
    twin.tick(&inputs);
    print!("{}", twin.status());

    let crack_colour = twin.config().gradient.crack;
    let cracked = twin
        .colors()
        .iter()
        .filter(|colour| **colour == crack_colour)
        .count();
    println!("{cracked} vertices painted at full crack intensity");

    Ok(())
}
