//! K-means, best-of restarts and DBSCAN on a simple 2D dataset.
//!
//! DBSCAN events are printed through a closure observer. The other fits report to the
//! `log` facade, which stays quiet unless a logger is installed.

use kluster::{BestOfKmeans, Dbscan, FitEvent, Kmeans, Verbosity, NOISE};

fn main() -> kluster::Result<()> {
    // Three well-separated clusters in 2D, plus one outlier.
    let data: Vec<Vec<f32>> = vec![
        // Cluster A (near origin)
        vec![0.0, 0.0],
        vec![0.1, 0.2],
        vec![0.2, 0.1],
        vec![-0.1, 0.1],
        // Cluster B (near (5, 5))
        vec![5.0, 5.0],
        vec![5.1, 4.9],
        vec![4.9, 5.1],
        vec![5.2, 5.2],
        // Cluster C (near (10, 0))
        vec![10.0, 0.0],
        vec![10.1, 0.1],
        vec![9.9, -0.1],
        vec![10.2, 0.2],
        // Outlier
        vec![30.0, 30.0],
    ];

    // --- K-means (k=3) ---
    let mut kmeans = Kmeans::new(3).with_seed(42);
    let fit = kmeans.fit(&data)?;
    println!(
        "=== K-means (k=3): inertia {:.3} after {} iterations ===",
        fit.inertia, fit.n_iter
    );
    for (i, label) in fit.labels.iter().enumerate() {
        println!("  point {:2} ({:5.1}, {:5.1}) => cluster {}", i, data[i][0], data[i][1], label);
    }
    let new_points = vec![vec![0.05, 0.05], vec![9.5, 0.5]];
    println!("  predict {:?} => {:?}", new_points, kmeans.predict(&new_points)?);

    // --- Best of 5 restarts ---
    let best = BestOfKmeans::new(Kmeans::new(3), 5)
        .with_base_seed(42)
        .fit(&data)?;
    println!(
        "\n=== Best of 5: run {} wins with inertia {:.3} (all: {:?}) ===",
        best.best_run,
        best.best_inertia(),
        best.inertias
    );

    // --- DBSCAN (eps=1.0, min_samples=2) ---
    let report = |event: &FitEvent| println!("  [event] {event:?}");
    let fit = Dbscan::new(1.0, 2)
        .with_verbosity(Verbosity::Summary)
        .fit_with_observer(&data, &report)?;
    println!(
        "\n=== DBSCAN (eps=1.0, min_samples=2): {} clusters, {} noise ===",
        fit.n_clusters, fit.n_noise
    );
    for (i, label) in fit.labels.iter().enumerate() {
        let tag = if *label == NOISE {
            "NOISE".to_string()
        } else {
            format!("cluster {}", label)
        };
        println!("  point {:2} ({:5.1}, {:5.1}) => {}", i, data[i][0], data[i][1], tag);
    }

    Ok(())
}
